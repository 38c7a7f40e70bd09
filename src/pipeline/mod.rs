//! Pipeline stages for note-to-HTML export.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested alone and reordered without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! note ─▶ frontmatter ─▶ code ─▶ math ─▶ images ─▶ restore code ─▶ render
//!                                                                    │
//!  html ◀─ toc ◀─ cleanup ◀─ resolve images (svg) ◀─ restore math ◀──┘
//! ```
//!
//! 1. [`frontmatter`]: drop the leading metadata block, keep its title
//! 2. [`code`]: park code spans so `$` and `![[…]]` inside them stay literal
//! 3. [`math`]: park `$$…$$` then `$…$`
//! 4. [`images`]: park `![[…]]` and `![](…)` embeds with their vault paths
//! 5. code comes back, the Markdown renderer runs with math/image placeholders inert
//! 6. [`math`]: placeholders become escaped `\(…\)` / `\[…\]`
//! 7. [`images`]: resolve, rasterise ([`svg`]), store or inline, substitute
//! 8. [`cleanup`]: inline theme styles, strip classes
//! 9. [`toc`]: optional outline
//!
//! All of it shares one [`placeholder::PlaceholderCounter`] per export.

pub mod cleanup;
pub mod code;
pub mod frontmatter;
pub mod images;
pub mod math;
pub mod placeholder;
pub mod svg;
pub mod toc;
