// ============================================================================
// IMAGE CACHE — source key → decoded bitmap, decoded off the UI thread
// ============================================================================
//
// Decodes run on the rayon pool and report back through an mpsc channel that
// only the owning engine drains (`poll`), so the entry map has exactly one
// writer.  Entries are never evicted while the cache is alive.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose};
use image::RgbaImage;

/// Decode state of one source.
#[derive(Clone, Debug)]
pub enum DecodeStatus {
    Pending,
    Loaded(Arc<RgbaImage>),
    /// Kept as a tombstone so the renderer never re-issues the decode.
    Failed,
}

/// Completion posted by a decode task.
pub struct DecodeMessage {
    pub src: String,
    pub result: Result<RgbaImage, String>,
}

pub struct ImageCache {
    entries: HashMap<String, DecodeStatus>,
    /// In-memory sources (uploads, design-file payloads) keyed like `src`.
    blobs: HashMap<String, Arc<Vec<u8>>>,
    sender: mpsc::Sender<DecodeMessage>,
    receiver: mpsc::Receiver<DecodeMessage>,
    pending: usize,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCache {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            entries: HashMap::new(),
            blobs: HashMap::new(),
            sender,
            receiver,
            pending: 0,
        }
    }

    /// Make encoded bytes resolvable under `src`.
    pub fn register_bytes(&mut self, src: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.insert(src.into(), Arc::new(bytes));
    }

    pub fn blobs(&self) -> impl Iterator<Item = (&String, &Arc<Vec<u8>>)> {
        self.blobs.iter()
    }

    /// Seed a loaded entry without going through a decode task.
    pub fn insert_decoded(&mut self, src: impl Into<String>, image: RgbaImage) {
        let src = src.into();
        if matches!(self.entries.get(&src), Some(DecodeStatus::Pending)) {
            self.pending = self.pending.saturating_sub(1);
        }
        self.entries.insert(src, DecodeStatus::Loaded(Arc::new(image)));
    }

    pub fn status(&self, src: &str) -> Option<&DecodeStatus> {
        self.entries.get(src)
    }

    /// The bitmap if it is already decoded, without side effects.
    pub fn get(&self, src: &str) -> Option<Arc<RgbaImage>> {
        match self.entries.get(src) {
            Some(DecodeStatus::Loaded(img)) => Some(Arc::clone(img)),
            _ => None,
        }
    }

    pub fn is_loaded(&self, src: &str) -> bool {
        matches!(self.entries.get(src), Some(DecodeStatus::Loaded(_)))
    }

    /// Return the bitmap when loaded; otherwise make sure exactly one decode
    /// is in flight for `src` and return `None`.
    pub fn request(&mut self, src: &str) -> Option<Arc<RgbaImage>> {
        match self.entries.get(src) {
            Some(DecodeStatus::Loaded(img)) => return Some(Arc::clone(img)),
            Some(DecodeStatus::Pending) | Some(DecodeStatus::Failed) => return None,
            None => {}
        }

        self.entries.insert(src.to_string(), DecodeStatus::Pending);
        self.pending += 1;

        let src = src.to_string();
        let blob = self.blobs.get(&src).cloned();
        let sender = self.sender.clone();
        rayon::spawn(move || {
            let result = decode_source(&src, blob.as_deref().map(|b| b.as_slice()));
            let _ = sender.send(DecodeMessage { src, result });
        });
        None
    }

    /// Drain finished decodes into the entry map.  Returns `true` when any
    /// entry changed, i.e. the scene needs a repaint.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(msg) = self.receiver.try_recv() {
            changed |= self.apply(msg);
        }
        changed
    }

    /// Block until no decode is pending or `timeout` elapses.  Returns `true`
    /// when anything changed.  Intended for headless rendering.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut changed = self.poll();
        while self.pending > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.receiver.recv_timeout(deadline - now) {
                Ok(msg) => changed |= self.apply(msg),
                Err(_) => break,
            }
        }
        changed
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every bitmap and blob.  In-flight decodes finish on the pool
    /// and are discarded when they report back.
    pub fn dispose(&mut self) {
        self.entries.clear();
        self.blobs.clear();
        self.pending = 0;
    }

    fn apply(&mut self, msg: DecodeMessage) -> bool {
        // Only a pending entry accepts a result; anything else was disposed
        // or already seeded.
        if !matches!(self.entries.get(&msg.src), Some(DecodeStatus::Pending)) {
            return false;
        }
        self.pending = self.pending.saturating_sub(1);
        match msg.result {
            Ok(img) => {
                self.entries.insert(msg.src, DecodeStatus::Loaded(Arc::new(img)));
            }
            Err(e) => {
                log_warn!("Image decode failed for '{}': {}", short_src(&msg.src), e);
                self.entries.insert(msg.src, DecodeStatus::Failed);
            }
        }
        true
    }
}

/// Resolve `src` to bytes and decode them.  Order of resolution: a
/// registered blob, a `data:` URL, then a filesystem path.
pub fn decode_source(src: &str, blob: Option<&[u8]>) -> Result<RgbaImage, String> {
    let owned;
    let bytes: &[u8] = if let Some(b) = blob {
        b
    } else if let Some(payload) = src.strip_prefix("data:") {
        owned = decode_data_url(payload)?;
        &owned
    } else {
        owned = std::fs::read(Path::new(src)).map_err(|e| e.to_string())?;
        &owned
    };
    image::load_from_memory(bytes)
        .map(|img| img.into_rgba8())
        .map_err(|e| e.to_string())
}

/// Payload of a `data:` URL (after the scheme), base64 only.
fn decode_data_url(payload: &str) -> Result<Vec<u8>, String> {
    let Some((meta, data)) = payload.split_once(',') else {
        return Err("malformed data URL".to_string());
    };
    if !meta.ends_with(";base64") {
        return Err("only base64 data URLs are supported".to_string());
    }
    general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| e.to_string())
}

/// Keep data URLs out of the log.
fn short_src(src: &str) -> &str {
    if src.starts_with("data:") {
        "data:…"
    } else {
        src
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn request_is_idempotent_while_pending() {
        let mut cache = ImageCache::new();
        cache.register_bytes("a", png_bytes(4, 3));
        assert!(cache.request("a").is_none());
        assert!(cache.request("a").is_none());
        assert_eq!(cache.pending_count(), 1);

        assert!(cache.wait_idle(Duration::from_secs(10)));
        let img = cache.request("a").expect("decoded");
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn failed_decode_is_not_retried() {
        let mut cache = ImageCache::new();
        cache.register_bytes("junk", vec![1, 2, 3, 4]);
        cache.request("junk");
        cache.wait_idle(Duration::from_secs(10));
        assert!(matches!(cache.status("junk"), Some(DecodeStatus::Failed)));
        assert!(cache.request("junk").is_none());
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn data_urls_decode() {
        let url = format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(png_bytes(2, 2))
        );
        let img = decode_source(&url, None).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert!(decode_source("data:text/plain,hello", None).is_err());
    }

    #[test]
    fn seeded_entries_are_loaded_immediately() {
        let mut cache = ImageCache::new();
        cache.insert_decoded("x", RgbaImage::new(5, 5));
        assert!(cache.is_loaded("x"));
        assert!(cache.request("x").is_some());
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn dispose_discards_late_results() {
        let mut cache = ImageCache::new();
        cache.register_bytes("a", png_bytes(1, 1));
        cache.request("a");
        cache.dispose();
        std::thread::sleep(Duration::from_millis(50));
        assert!(!cache.poll());
        assert!(cache.is_empty());
    }
}
