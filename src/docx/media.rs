//! Image loading for the document-model walker.
//!
//! An `<img src>` can be a `data:` URI (what embed-mode export produces), a
//! remote URL, or a path inside the vault. Whatever it is, the result is
//! PNG or JPEG bytes (the formats every word processor reads) plus a
//! display size no wider than the configured maximum.

use crate::collab::AssetResolver;
use crate::docx::math::fit_width;
use crate::docx::model::ImageData;
use crate::error::AssetError;
use crate::pipeline::svg::{rasterize_svg, Rasterizer, SUPERSAMPLE};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, ImageReader};
use once_cell::sync::OnceCell;
use percent_encoding::percent_decode_str;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Check if the source looks like a remote URL.
pub fn is_url(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

fn looks_like_svg(mime: Option<&str>, bytes: &[u8]) -> bool {
    if mime.is_some_and(|m| m.starts_with("image/svg")) {
        return true;
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

/// Split a `data:` URI into MIME type and decoded payload.
pub fn decode_data_uri(src: &str) -> Result<(String, Vec<u8>), AssetError> {
    let fail = |detail: &str| AssetError::DecodeFailed {
        src: truncate(src),
        detail: detail.to_string(),
    };
    let rest = src.strip_prefix("data:").ok_or_else(|| fail("not a data: URI"))?;
    let (meta, payload) = rest.split_once(',').ok_or_else(|| fail("missing ','"))?;
    let is_base64 = meta.ends_with(";base64");
    let mime = meta
        .trim_end_matches(";base64")
        .split(';')
        .next()
        .unwrap_or("")
        .to_string();
    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact).map_err(|e| fail(&e.to_string()))?
    } else {
        percent_decode_str(payload).collect()
    };
    Ok((mime, bytes))
}

/// Keep error messages readable when the source is a huge data URI.
fn truncate(src: &str) -> String {
    const MAX: usize = 64;
    if src.chars().count() <= MAX {
        src.to_string()
    } else {
        let cut: String = src.chars().take(MAX).collect();
        format!("{cut}…")
    }
}

/// Fetches and normalises images referenced from HTML.
pub struct MediaLoader<'a> {
    resolver: Option<&'a dyn AssetResolver>,
    note_path: &'a str,
    rasterizer: Arc<dyn Rasterizer>,
    timeout: Duration,
    max_width: u32,
    /// Shared by every remote image of one document.
    client: OnceCell<reqwest::Client>,
}

impl<'a> MediaLoader<'a> {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, max_width: u32, timeout: Duration) -> Self {
        Self {
            resolver: None,
            note_path: "",
            rasterizer,
            timeout,
            max_width,
            client: OnceCell::new(),
        }
    }

    /// Resolve relative sources against a vault.
    pub fn with_resolver(mut self, resolver: &'a dyn AssetResolver, note_path: &'a str) -> Self {
        self.resolver = Some(resolver);
        self.note_path = note_path;
        self
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    /// Load `src`, honouring an explicit `width` attribute.
    pub async fn load(&self, src: &str, requested_width: Option<u32>) -> Result<ImageData, AssetError> {
        let (mime, bytes) = self.fetch(src).await?;

        let is_svg = looks_like_svg(Some(&mime), &bytes);
        let bytes = if is_svg {
            let rasterizer = Arc::clone(&self.rasterizer);
            tokio::task::spawn_blocking(move || rasterize_svg(&*rasterizer, &bytes))
                .await
                .map_err(|e| AssetError::DecodeFailed {
                    src: truncate(src),
                    detail: format!("rasterizer task panicked: {e}"),
                })?
                .map_err(|e| AssetError::DecodeFailed {
                    src: truncate(src),
                    detail: e.to_string(),
                })?
        } else {
            bytes
        };

        let (bytes, natural_w, natural_h) = normalize_raster(src, bytes)?;
        // Rasterised SVGs were drawn at 2×; their natural display size is half.
        let (natural_w, natural_h) = if is_svg {
            ((natural_w / SUPERSAMPLE).max(1), (natural_h / SUPERSAMPLE).max(1))
        } else {
            (natural_w, natural_h)
        };

        let (w, h) = match requested_width {
            Some(rw) if rw > 0 && natural_w > 0 => {
                let h = ((natural_h as f64) * (rw as f64) / (natural_w as f64)).round().max(1.0) as u32;
                (rw, h)
            }
            _ => (natural_w, natural_h),
        };
        let (width, height) = fit_width(w, h, self.max_width);
        debug!("Loaded image {} → {}x{} ({} bytes)", truncate(src), width, height, bytes.len());
        Ok(ImageData { bytes, width, height })
    }

    async fn fetch(&self, src: &str) -> Result<(String, Vec<u8>), AssetError> {
        if src.starts_with("data:") {
            return decode_data_uri(src);
        }
        if is_url(src) {
            return self.download(src).await;
        }

        let path = percent_decode_str(src).decode_utf8_lossy().into_owned();
        let resolver = self.resolver.ok_or_else(|| AssetError::NotFound { path: path.clone() })?;
        let handle = resolver
            .resolve(&path, self.note_path)
            .await
            .ok_or_else(|| AssetError::NotFound { path: path.clone() })?;
        let bytes = resolver
            .read_binary(&handle)
            .await
            .map_err(|e| AssetError::ReadFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        let mime = if handle.extension() == "svg" {
            "image/svg+xml".to_string()
        } else {
            String::new()
        };
        Ok((mime, bytes))
    }

    fn client(&self) -> reqwest::Result<&reqwest::Client> {
        self.client
            .get_or_try_init(|| reqwest::Client::builder().timeout(self.timeout).build())
    }

    async fn download(&self, url: &str) -> Result<(String, Vec<u8>), AssetError> {
        let fail = |detail: String| AssetError::FetchFailed {
            src: url.to_string(),
            detail,
        };
        let response = self
            .client()
            .map_err(|e| fail(e.to_string()))?
            .get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                fail(format!("timed out after {}s", self.timeout.as_secs()))
            } else {
                fail(e.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok((mime, bytes.to_vec()))
    }
}

/// Make sure the bytes are PNG or JPEG and read their pixel size.
///
/// Returns `(bytes, width, height)`.
fn normalize_raster(src: &str, bytes: Vec<u8>) -> Result<(Vec<u8>, u32, u32), AssetError> {
    let decode_err = |e: image::ImageError| AssetError::DecodeFailed {
        src: truncate(src),
        detail: e.to_string(),
    };
    let reader = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| AssetError::DecodeFailed {
            src: truncate(src),
            detail: e.to_string(),
        })?;
    match reader.format() {
        Some(ImageFormat::Png) | Some(ImageFormat::Jpeg) => {
            let (w, h) = reader.into_dimensions().map_err(decode_err)?;
            Ok((bytes, w, h))
        }
        Some(_) => {
            let img = reader.decode().map_err(decode_err)?;
            let mut png = Vec::new();
            img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(decode_err)?;
            Ok((png, img.width(), img.height()))
        }
        None => Err(AssetError::DecodeFailed {
            src: truncate(src),
            detail: "unrecognised image format".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RasterError;
    use image::{Rgba, RgbaImage};

    struct FixedRaster;

    impl Rasterizer for FixedRaster {
        fn rasterize(&self, _svg: &[u8], w: u32, h: u32) -> Result<Vec<u8>, RasterError> {
            Ok(png_bytes(w, h))
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 255]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn loader(max: u32) -> MediaLoader<'static> {
        MediaLoader::new(Arc::new(FixedRaster), max, Duration::from_secs(5))
    }

    #[test]
    fn http_client_is_shared_across_images() {
        let loader = loader(600);
        let first = loader.client().unwrap() as *const reqwest::Client;
        let second = loader.client().unwrap() as *const reqwest::Client;
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn data_uri_base64_and_plain() {
        let (mime, bytes) = decode_data_uri("data:image/png;base64,AQID").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, [1, 2, 3]);
        let (mime, bytes) = decode_data_uri("data:image/svg+xml,%3Csvg%2F%3E").unwrap();
        assert_eq!(mime, "image/svg+xml");
        assert_eq!(bytes, b"<svg/>");
        assert!(decode_data_uri("data:image/png;base64").is_err());
    }

    #[tokio::test]
    async fn wide_image_is_downscaled_proportionally() {
        let src = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(1200, 300)));
        let img = loader(600).load(&src, None).await.unwrap();
        assert_eq!((img.width, img.height), (600, 150));
    }

    #[tokio::test]
    async fn explicit_width_is_honoured() {
        let src = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(400, 200)));
        let img = loader(600).load(&src, Some(100)).await.unwrap();
        assert_eq!((img.width, img.height), (100, 50));
    }

    #[tokio::test]
    async fn svg_data_uri_is_rasterised_at_natural_size() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="50" height="20"/>"#;
        let src = format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg));
        let img = loader(600).load(&src, None).await.unwrap();
        assert_eq!((img.width, img.height), (50, 20));
        assert!(img.bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[tokio::test]
    async fn gif_is_converted_to_png() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let mut gif = Vec::new();
        img.write_to(&mut Cursor::new(&mut gif), ImageFormat::Gif).unwrap();
        let src = format!("data:image/gif;base64,{}", STANDARD.encode(&gif));
        let out = loader(600).load(&src, None).await.unwrap();
        assert!(out.bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!((out.width, out.height), (3, 2));
    }

    #[tokio::test]
    async fn relative_source_without_vault_is_not_found() {
        let err = loader(600).load("pics/a%20b.png", None).await.unwrap_err();
        assert_eq!(err, AssetError::NotFound { path: "pics/a b.png".into() });
    }

    #[tokio::test]
    async fn garbage_bytes_fail_to_decode() {
        let src = format!("data:image/png;base64,{}", STANDARD.encode(b"nope"));
        assert!(matches!(
            loader(600).load(&src, None).await,
            Err(AssetError::DecodeFailed { .. })
        ));
    }
}
