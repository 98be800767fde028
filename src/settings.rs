use std::path::PathBuf;

/// Persistent editor preferences.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Logical size of a fresh design surface.
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub background_color: [u8; 4],
    /// Dotted alignment grid on interactive frames.
    pub show_grid: bool,
    /// Upload cap in megabytes.
    pub max_upload_mb: u64,
    /// Sticker defaults applied to newly uploaded images.
    pub default_border_width: f32,
    pub default_border_color: [u8; 4],
    /// Corner-handle resize keeps the element's aspect ratio.
    pub aspect_lock: bool,
    pub default_quantity: u32,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
            background_color: [0x1a, 0x1a, 0x2e, 255],
            show_grid: true,
            max_upload_mb: 25,
            default_border_width: 10.0,
            default_border_color: [255, 255, 255, 255],
            aspect_lock: true,
            default_quantity: 50,
        }
    }
}

/// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(s: &str) -> Option<[u8; 4]> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some([channel(0)?, channel(2)?, channel(4)?, 255]),
        8 => Some([channel(0)?, channel(2)?, channel(4)?, channel(6)?]),
        _ => None,
    }
}

/// Inverse of [`parse_hex_color`]; alpha is omitted when opaque.
pub fn color_to_hex(c: [u8; 4]) -> String {
    if c[3] == 255 {
        format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
    } else {
        format!("#{:02x}{:02x}{:02x}{:02x}", c[0], c[1], c[2], c[3])
    }
}

impl EditorSettings {
    /// Upload cap in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Path to the settings file.
    /// On Linux:   ~/.config/stickerstudio/stickerstudio_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\StickerStudio\stickerstudio_settings.cfg
    /// On macOS:   ~/Library/Application Support/StickerStudio/stickerstudio_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("stickerstudio");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stickerstudio_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .unwrap_or_default();
            let config_dir = PathBuf::from(appdata).join("StickerStudio");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stickerstudio_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("StickerStudio");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("stickerstudio_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("stickerstudio_settings.cfg")))
        }
    }

    /// Serialize to the `key=value` config format.
    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             background_color={}\n\
             show_grid={}\n\
             max_upload_mb={}\n\
             default_border_width={}\n\
             default_border_color={}\n\
             aspect_lock={}\n\
             default_quantity={}\n",
            self.canvas_width,
            self.canvas_height,
            color_to_hex(self.background_color),
            self.show_grid,
            self.max_upload_mb,
            self.default_border_width,
            color_to_hex(self.default_border_color),
            self.aspect_lock,
            self.default_quantity,
        )
    }

    /// Parse the `key=value` config format.  Unknown keys are ignored and a
    /// malformed value keeps that key's default.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "canvas_width" => {
                    s.canvas_width = val.parse().unwrap_or(s.canvas_width);
                }
                "canvas_height" => {
                    s.canvas_height = val.parse().unwrap_or(s.canvas_height);
                }
                "background_color" => {
                    if let Some(c) = parse_hex_color(val) { s.background_color = c; }
                }
                "show_grid" => {
                    s.show_grid = val == "true";
                }
                "max_upload_mb" => {
                    s.max_upload_mb = val.parse().unwrap_or(s.max_upload_mb);
                }
                "default_border_width" => {
                    s.default_border_width = val.parse().unwrap_or(s.default_border_width);
                }
                "default_border_color" => {
                    if let Some(c) = parse_hex_color(val) { s.default_border_color = c; }
                }
                "aspect_lock" => {
                    s.aspect_lock = val == "true";
                }
                "default_quantity" => {
                    s.default_quantity = val.parse().unwrap_or(s.default_quantity);
                }
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or unreadable)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}
