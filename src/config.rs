//! Configuration types for note export.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. Every knob lives in one struct so a config can be
//! shared across tasks, logged, and diffed between runs.

use crate::error::NotepressError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for an export.
///
/// Built via [`ExportConfig::builder()`] or using [`ExportConfig::default()`].
///
/// # Example
/// ```rust
/// use notepress::{ExportConfig, ImageMode};
///
/// let config = ExportConfig::builder()
///     .image_mode(ImageMode::Embed)
///     .theme("github")
///     .include_toc(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// How resolved images are referenced from the HTML. Default: [`ImageMode::Embed`].
    pub image_mode: ImageMode,

    /// Theme name passed to [`crate::theme::lookup_theme`]. Default: `"default"`.
    ///
    /// Unknown names fall back to the default theme rather than failing.
    pub theme: String,

    /// Insert a table of contents after the first level-1 heading. Default: false.
    pub include_toc: bool,

    /// Text rendered above the body (HTML `<header>`, DOCX page header).
    pub header_text: Option<String>,

    /// Text rendered below the body (HTML `<footer>`, DOCX page footer).
    pub footer_text: Option<String>,

    /// Document title. If None, uses the frontmatter `title:`, then the first
    /// level-1 heading, then the note's file stem.
    pub title: Option<String>,

    /// Maximum display width in pixels for images in the document model. Default: 600.
    ///
    /// Wider images are scaled down proportionally. 600 px roughly matches the
    /// text column of a Letter/A4 page with 1-inch margins.
    pub max_image_width: u32,

    /// Timeout for remote image fetches during document-model conversion. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Per-image progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::default(),
            theme: "default".to_string(),
            include_toc: false,
            header_text: None,
            footer_text: None,
            title: None,
            max_image_width: 600,
            fetch_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("image_mode", &self.image_mode)
            .field("theme", &self.theme)
            .field("include_toc", &self.include_toc)
            .field("header_text", &self.header_text)
            .field("footer_text", &self.footer_text)
            .field("title", &self.title)
            .field("max_image_width", &self.max_image_width)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn image_mode(mut self, mode: ImageMode) -> Self {
        self.config.image_mode = mode;
        self
    }

    pub fn theme(mut self, name: impl Into<String>) -> Self {
        self.config.theme = name.into();
        self
    }

    pub fn include_toc(mut self, v: bool) -> Self {
        self.config.include_toc = v;
        self
    }

    pub fn header_text(mut self, text: impl Into<String>) -> Self {
        self.config.header_text = Some(text.into());
        self
    }

    pub fn footer_text(mut self, text: impl Into<String>) -> Self {
        self.config.footer_text = Some(text.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn max_image_width(mut self, px: u32) -> Self {
        self.config.max_image_width = px;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, NotepressError> {
        let c = &self.config;
        if c.max_image_width < 16 {
            return Err(NotepressError::InvalidConfig(format!(
                "max_image_width must be ≥ 16 px, got {}",
                c.max_image_width
            )));
        }
        if c.fetch_timeout_secs == 0 {
            return Err(NotepressError::InvalidConfig(
                "fetch_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How resolved images end up referenced from the exported HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Hand the bytes to the [`crate::collab::AssetStore`] and reference the
    /// returned public locator.
    Upload,
    /// Inline the bytes as a base64 `data:` URI. (default)
    #[default]
    Embed,
}

impl FromStr for ImageMode {
    type Err = NotepressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upload" => Ok(ImageMode::Upload),
            "embed" => Ok(ImageMode::Embed),
            other => Err(NotepressError::InvalidConfig(format!(
                "unknown image mode '{other}' (expected 'upload' or 'embed')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExportConfig::default();
        assert_eq!(c.image_mode, ImageMode::Embed);
        assert_eq!(c.theme, "default");
        assert!(!c.include_toc);
        assert_eq!(c.max_image_width, 600);
    }

    #[test]
    fn builder_rejects_tiny_image_width() {
        let err = ExportConfig::builder().max_image_width(4).build().unwrap_err();
        assert!(err.to_string().contains("max_image_width"));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ExportConfig::builder().fetch_timeout_secs(0).build().is_err());
    }

    #[test]
    fn image_mode_parses_case_insensitively() {
        assert_eq!("Upload".parse::<ImageMode>().unwrap(), ImageMode::Upload);
        assert_eq!(" embed ".parse::<ImageMode>().unwrap(), ImageMode::Embed);
        assert!("inline".parse::<ImageMode>().is_err());
    }

    #[test]
    fn debug_hides_callback() {
        let c = ExportConfig::default();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("image_mode"));
    }
}
