//! # notepress
//!
//! Export vault notes (Markdown with LaTeX, image embeds, callouts, tables and
//! code) to self-contained HTML and to Word documents.
//!
//! ## Why this crate?
//!
//! A Markdown renderer loses exactly what an export needs: `$x^2$` comes out
//! as prose with stray dollar signs, `![[diagram.svg]]` comes out as a broken
//! link, and whatever it does produce depends on CSS classes that vanish the
//! moment the HTML is pasted into a mail client or a CMS. This crate parks
//! math, embeds and code behind placeholders before rendering, puts them back
//! afterwards in portable form, and inlines every style.
//!
//! ## Pipeline Overview
//!
//! ```text
//! note.md
//!  │
//!  ├─ 1. Frontmatter  drop the metadata block, keep its title
//!  ├─ 2. Extract      code → math → image embeds become placeholders
//!  ├─ 3. Render       code restored, Markdown renderer runs (collaborator)
//!  ├─ 4. Restore      math as \( \) / \[ \], images resolved 5 at a time
//!  ├─ 5. Theme        inline styles, callouts, no classes
//!  ├─ 6. TOC          optional outline after the first <h1>
//!  └─ 7. Output       HTML document, or DOM walk → document model → .docx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notepress::{export_html, Collaborators, ExportConfig, SourceContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let collab = Collaborators::for_vault("vault");
//!     let note = std::fs::read_to_string("vault/notes/physics.md")?;
//!     let config = ExportConfig::builder().theme("academic").include_toc(true).build()?;
//!     let output = export_html(&note, &SourceContext::new("notes/physics.md"), &collab, &config).await?;
//!     println!("{}", output.html);
//!     eprintln!("images: {}/{} ok", output.stats.images_ok(), output.stats.images_total);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notepress` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! notepress = { version = "0.3", default-features = false }
//! ```
//!
//! ## Themes
//!
//! | Theme | Look |
//! |-------|------|
//! | `default`  | neutral sans-serif |
//! | `github`   | GitHub README styling |
//! | `academic` | Latin Modern serif, paper-like |
//! | `sepia`    | warm background, book serif |
//!
//! Unknown names fall back to `default`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod collab;
pub mod config;
pub mod docx;
pub mod error;
pub mod export;
pub mod markdown;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod theme;
pub mod vault;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collab::{AssetHandle, AssetResolver, AssetStore, MarkdownRenderer, SourceContext};
pub use config::{ExportConfig, ExportConfigBuilder, ImageMode};
pub use docx::{MathRenderer, ResvgMathRenderer};
pub use error::{AssetError, BoxError, NotepressError, RasterError};
pub use export::{export_docx, export_html, export_html_sync, export_to_file, read_note, Collaborators, OutputFormat};
pub use markdown::PulldownRenderer;
pub use output::{DocxExport, ExportStats, HtmlExport};
pub use pipeline::svg::{Rasterizer, ResvgRasterizer};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use theme::{lookup_theme, Theme};
pub use vault::{DirectoryStore, FsVault};
