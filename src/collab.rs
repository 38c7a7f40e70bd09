//! Collaborator interfaces consumed by the export pipeline.
//!
//! The pipeline owns the hard parts (extraction, restoration, cleanup, the
//! DOM walk) and delegates everything environment-specific to these traits:
//!
//! | Trait | Responsibility | Bundled implementation |
//! |-------|----------------|------------------------|
//! | [`MarkdownRenderer`] | Markdown → HTML | [`crate::markdown::PulldownRenderer`] |
//! | [`AssetResolver`] | vault path → bytes | [`crate::vault::FsVault`] |
//! | [`AssetStore`] | bytes → public URL (upload mode) | [`crate::vault::DirectoryStore`] |
//!
//! The rasterisation capabilities live next to the code that uses them:
//! [`crate::pipeline::svg::Rasterizer`] and [`crate::docx::math::MathRenderer`].

use crate::error::BoxError;
use async_trait::async_trait;
use std::path::Path;

/// Where the note being exported lives, relative to its vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContext {
    /// Vault-relative path of the note, using `/` separators (e.g. `notes/today.md`).
    pub note_path: String,
}

impl SourceContext {
    pub fn new(note_path: impl Into<String>) -> Self {
        Self {
            note_path: note_path.into(),
        }
    }

    /// The note's file stem, used as a last-resort document title.
    pub fn stem(&self) -> Option<&str> {
        Path::new(&self.note_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
    }
}

/// A resolved reference to a concrete asset inside the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    /// Vault-relative path of the resolved file.
    pub path: String,
    /// File name including extension.
    pub name: String,
}

impl AssetHandle {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self { path, name }
    }

    /// Lower-cased extension without the dot, or `""`.
    pub fn extension(&self) -> String {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Opaque Markdown → HTML renderer.
///
/// Implementations must leave unrecognised alphanumeric tokens untouched:
/// the pipeline parks math and image placeholders in the Markdown and
/// expects to find them verbatim in the HTML.
#[async_trait]
pub trait MarkdownRenderer: Send + Sync {
    async fn render(&self, markdown: &str, source: &SourceContext) -> Result<String, BoxError>;
}

/// Vault file resolution.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    /// Resolve a link target as written in the note to a concrete asset.
    ///
    /// `context_path` is the vault-relative path of the linking note.
    /// Returns `None` when no such asset exists.
    async fn resolve(&self, path: &str, context_path: &str) -> Option<AssetHandle>;

    /// Read the asset's bytes.
    async fn read_binary(&self, handle: &AssetHandle) -> Result<Vec<u8>, BoxError>;
}

/// Publishes asset bytes and returns the locator to reference them by.
///
/// Only consulted in [`crate::config::ImageMode::Upload`].
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(&self, bytes: &[u8], name: &str, mime: &str) -> Result<String, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_name_and_extension() {
        let h = AssetHandle::new("attachments/Diagram.SVG");
        assert_eq!(h.name, "Diagram.SVG");
        assert_eq!(h.extension(), "svg");
    }

    #[test]
    fn handle_without_extension() {
        assert_eq!(AssetHandle::new("README").extension(), "");
    }

    #[test]
    fn source_stem() {
        assert_eq!(SourceContext::new("notes/My Note.md").stem(), Some("My Note"));
        assert_eq!(SourceContext::default().stem(), None);
    }
}
