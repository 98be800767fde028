/// Why an uploaded file was refused.  `Display` is the message shown to the
/// customer next to the upload button.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadError {
    /// File exceeds the upload cap.  Sizes are in bytes.
    TooLarge { size: u64, limit: u64 },
    /// Extension is advertised but cannot be rasterized, or is not accepted at all.
    UnsupportedFormat(String),
    /// Bytes could not be decoded as a raster image.
    Decode(String),
    /// Zero-byte file.
    Empty,
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::TooLarge { size, limit } => write!(
                f,
                "File is too large ({:.1} MB). Maximum upload size is {} MB.",
                *size as f64 / (1024.0 * 1024.0),
                limit / (1024 * 1024)
            ),
            UploadError::UnsupportedFormat(ext) => write!(
                f,
                "'.{}' files can't be placed on the canvas. Please upload a PNG, JPG, GIF, WEBP or BMP image.",
                ext
            ),
            UploadError::Decode(e) => write!(f, "Could not read image: {}", e),
            UploadError::Empty => write!(f, "The selected file is empty."),
        }
    }
}

impl std::error::Error for UploadError {}

/// Error type for engine I/O: export, design files, cart handoff.
#[derive(Debug)]
pub enum EngineError {
    Io(std::io::Error),
    Image(String),
    Serialize(String),
    InvalidFormat(String),
    NoSurface,
    Cart(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Io(e) => write!(f, "I/O error: {}", e),
            EngineError::Image(e) => write!(f, "Image error: {}", e),
            EngineError::Serialize(e) => write!(f, "Serialization error: {}", e),
            EngineError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
            EngineError::NoSurface => write!(f, "No drawing surface attached"),
            EngineError::Cart(e) => write!(f, "Cart rejected item: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::Image(e.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for EngineError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        EngineError::Serialize(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_message_names_the_limit() {
        let err = UploadError::TooLarge {
            size: 30 * 1024 * 1024,
            limit: 25 * 1024 * 1024,
        };
        let msg = err.to_string();
        assert!(msg.contains("30.0 MB"));
        assert!(msg.contains("25 MB"));
    }

    #[test]
    fn unsupported_message_names_extension() {
        let msg = UploadError::UnsupportedFormat("svg".into()).to_string();
        assert!(msg.contains(".svg"));
    }
}
