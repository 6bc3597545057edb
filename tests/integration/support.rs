//! Shared fixtures: an in-memory media source and image writers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageFormat, Rgb, RgbImage};
use mediavault::download::{FetchError, MediaBody, MediaSource};

/// Serves registered URLs from memory; everything else is a 404.
pub struct MemorySource {
    files: Mutex<HashMap<String, Bytes>>,
    pages: Mutex<HashMap<String, String>>,
    chunk: usize,
    delay: Duration,
    opens: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::with_chunking(4096, Duration::ZERO)
    }

    /// Bodies are split into `chunk`-byte pieces, each delayed by `delay`.
    pub fn with_chunking(chunk: usize, delay: Duration) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            pages: Mutex::new(HashMap::new()),
            chunk,
            delay,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, url: &str, body: impl Into<Bytes>) {
        self.files.lock().unwrap().insert(url.to_string(), body.into());
    }

    pub fn insert_page(&self, url: &str, html: &str) {
        self.pages.lock().unwrap().insert(url.to_string(), html.to_string());
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

struct MemoryBody {
    data: Bytes,
    chunk: usize,
    delay: Duration,
}

#[async_trait]
impl MediaBody for MemoryBody {
    fn content_length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        if self.data.is_empty() {
            return Ok(None);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.chunk.min(self.data.len());
        Ok(Some(self.data.split_to(n)))
    }
}

#[async_trait]
impl MediaSource for MemorySource {
    async fn open(&self, url: &str) -> Result<Box<dyn MediaBody>, FetchError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let data = self.files.lock().unwrap().get(url).cloned();
        match data {
            Some(data) => Ok(Box::new(MemoryBody {
                data,
                chunk: self.chunk,
                delay: self.delay,
            })),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// A smooth diagonal gradient, `w` x `h`.
pub fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        let v = ((x * 255 / w.max(1)) + (y * 255 / h.max(1))) / 2;
        Rgb([v as u8, v as u8, v as u8])
    })
}

/// Left half dark, right half bright.
pub fn split(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, _| if x < w / 2 { Rgb([20, 20, 20]) } else { Rgb([235, 235, 235]) })
}

/// Encode `img` as PNG regardless of the file's extension.
pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    encode(img, ImageFormat::Png)
}

/// Encode `img` as BMP: same pixels as [`png_bytes`], different size.
pub fn bmp_bytes(img: &RgbImage) -> Vec<u8> {
    encode(img, ImageFormat::Bmp)
}

fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn write_png(path: &Path, img: &RgbImage) {
    std::fs::write(path, png_bytes(img)).unwrap();
}

pub fn set_mtime(path: &Path, unix_secs: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(unix_secs, 0)).unwrap();
}
