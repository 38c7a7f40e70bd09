//! Word-processor export.
//!
//! ```text
//! html ─▶ dom (html5ever) ─▶ walker ─▶ model::Document ─▶ writer (docx-rs) ─▶ .docx
//!                              │
//!                              ├─ media: data: / http(s) / vault images, svg → png
//!                              └─ math:  \(…\) \[…\] → png
//! ```
//!
//! The [`model`] is plain serialisable data, so the CLI can print it as JSON
//! instead of packing a file.

pub mod dom;
pub mod math;
pub mod media;
pub mod model;
pub mod styles;
pub mod walker;
pub mod writer;

pub use math::{MathRenderer, RenderedMath, ResvgMathRenderer};
pub use media::MediaLoader;
pub use model::{Block, Document, Run};
pub use walker::{html_to_document, WalkStats};
pub use writer::{write_docx, PageText};
