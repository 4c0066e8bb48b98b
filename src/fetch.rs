//! Background image loading.
//!
//! Sources are `data:` URIs, local paths (`file://` or bare), and `http(s)` URLs.
//! Every load runs under one overall timeout; any failure is reported as a
//! [`ResourceFetchError`] for the caller to degrade on.

use crate::error::ResourceFetchError;
use base64::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::Pixmap;

/// Decoded, premultiplied RGBA image ready for compositing.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixmap: Pixmap,
}

impl RasterImage {
    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    /// Decodes PNG or JPEG bytes. `mime` narrows the format when known.
    pub fn decode(data: &[u8], mime: Option<&str>) -> Result<Self, String> {
        decode_image_to_pixmap(data, mime).map(Self::from_pixmap)
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub(crate) fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl ImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bannerkit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self, url: &str) -> Result<Arc<RasterImage>, ResourceFetchError> {
        let ms = self.timeout.as_millis() as u64;
        match tokio::time::timeout(self.timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(ResourceFetchError::Timeout {
                url: url.to_string(),
                ms,
            }),
        }
    }

    async fn fetch_inner(&self, url: &str) -> Result<Arc<RasterImage>, ResourceFetchError> {
        let (bytes, mime) = match classify(url) {
            Source::DataUri => {
                let (mime, data) =
                    parse_data_uri(url).ok_or_else(|| ResourceFetchError::Decode {
                        url: short_url(url),
                        message: "malformed data uri".to_string(),
                    })?;
                (data, Some(mime))
            }
            Source::Http => self.fetch_http(url).await?,
            Source::File(path) => {
                let data = tokio::fs::read(&path)
                    .await
                    .map_err(|source| ResourceFetchError::Io {
                        url: url.to_string(),
                        source,
                    })?;
                (data, None)
            }
            Source::Unsupported => {
                return Err(ResourceFetchError::Unsupported {
                    url: url.to_string(),
                });
            }
        };

        let label = short_url(url);
        let decoded = tokio::task::spawn_blocking(move || {
            RasterImage::decode(&bytes, mime.as_deref())
        })
        .await
        .map_err(|err| ResourceFetchError::Decode {
            url: label.clone(),
            message: err.to_string(),
        })?;
        let image = decoded.map_err(|message| ResourceFetchError::Decode {
            url: label.clone(),
            message,
        })?;
        log::debug!(
            "loaded background {} ({}x{})",
            label,
            image.width(),
            image.height()
        );
        Ok(Arc::new(image))
    }

    async fn fetch_http(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ResourceFetchError> {
        let transport = |err: reqwest::Error| {
            if err.is_timeout() {
                ResourceFetchError::Timeout {
                    url: url.to_string(),
                    ms: self.timeout.as_millis() as u64,
                }
            } else {
                ResourceFetchError::Transport {
                    url: url.to_string(),
                    message: err.to_string(),
                }
            }
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResourceFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.bytes().await.map_err(transport)?;
        Ok((bytes.to_vec(), mime))
    }
}

enum Source {
    DataUri,
    Http,
    File(PathBuf),
    Unsupported,
}

fn classify(url: &str) -> Source {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("data:") {
        return Source::DataUri;
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Source::Http;
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        return Source::File(PathBuf::from(path));
    }
    // Anything else with a scheme (ftp:, blob:, ...) is not loadable here.
    let has_scheme = trimmed
        .split_once(':')
        .is_some_and(|(scheme, _)| {
            scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
        });
    if has_scheme {
        return Source::Unsupported;
    }
    Source::File(PathBuf::from(trimmed))
}

// Data URIs can be megabytes long; keep errors and logs readable.
fn short_url(url: &str) -> String {
    const MAX: usize = 64;
    if url.len() <= MAX {
        return url.to_string();
    }
    let mut end = MAX;
    while !url.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &url[..end])
}

fn decode_image_to_pixmap(data: &[u8], mime: Option<&str>) -> Result<Pixmap, String> {
    let guessed_format = match mime {
        Some(mime) if mime.contains("png") => Some(image::ImageFormat::Png),
        Some(mime) if mime.contains("jpeg") || mime.contains("jpg") => {
            Some(image::ImageFormat::Jpeg)
        }
        _ => image::guess_format(data).ok(),
    };

    let decoded = match guessed_format {
        Some(fmt) => image::load_from_memory_with_format(data, fmt),
        None => image::load_from_memory(data),
    }
    .map_err(|err| err.to_string())?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap =
        Pixmap::new(width, height).ok_or_else(|| format!("invalid image size {width}x{height}"))?;
    let src = rgba.as_raw();
    let dst = pixmap.data_mut();
    for (src_px, dst_px) in src.chunks_exact(4).zip(dst.chunks_exact_mut(4)) {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Ok(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|v| !v.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        let mut src = RgbaImage::new(w, h);
        for p in src.pixels_mut() {
            *p = image::Rgba(px);
        }
        let mut bytes = Vec::new();
        src.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn fetcher() -> ImageFetcher {
        ImageFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parse_data_uri_base64_decodes_payload() {
        let (mime, data) = parse_data_uri("data:text/plain;base64,SGVsbG8=").unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(data, b"Hello");
        assert!(parse_data_uri("https://x").is_none());
    }

    #[test]
    fn decode_premultiplies_alpha() {
        let image = RasterImage::decode(&png_bytes(1, 1, [255, 0, 0, 128]), Some("image/png")).unwrap();
        assert_eq!((image.width(), image.height()), (1, 1));
        let px = image.pixmap().pixel(0, 0).unwrap();
        assert_eq!(px.alpha(), 128);
        assert_eq!(px.red(), 128);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(RasterImage::decode(b"definitely not an image", None).is_err());
    }

    #[test]
    fn classifies_sources() {
        assert!(matches!(classify("data:image/png;base64,AA"), Source::DataUri));
        assert!(matches!(classify("HTTPS://img.test/a.jpg"), Source::Http));
        assert!(matches!(classify("file:///tmp/a.png"), Source::File(_)));
        assert!(matches!(classify("ftp://host/a.png"), Source::Unsupported));
        assert!(matches!(classify("assets/bg.png"), Source::File(_)));
    }

    #[test]
    fn long_urls_are_shortened() {
        let long = format!("data:image/png;base64,{}", "A".repeat(500));
        assert!(short_url(&long).len() < 80);
        assert_eq!(short_url("a.png"), "a.png");
    }

    #[tokio::test]
    async fn loads_data_uri_images() {
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes(3, 2, [0, 0, 255, 255]))
        );
        let image = fetcher().fetch(&uri).await.unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
    }

    #[tokio::test]
    async fn loads_images_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        std::fs::write(&path, png_bytes(4, 4, [10, 20, 30, 255])).unwrap();
        let image = fetcher().fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(image.width(), 4);
    }

    #[tokio::test]
    async fn missing_files_and_schemes_are_fetch_errors() {
        let err = fetcher().fetch("/definitely/missing/bg.png").await.unwrap_err();
        assert!(matches!(err, ResourceFetchError::Io { .. }));
        let err = fetcher().fetch("ftp://host/a.png").await.unwrap_err();
        assert!(matches!(err, ResourceFetchError::Unsupported { .. }));
        let err = fetcher().fetch("data:image/png;base64,!!!").await.unwrap_err();
        assert!(matches!(err, ResourceFetchError::Decode { .. }));
    }
}
