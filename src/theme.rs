//! Built-in export themes.
//!
//! A theme is an immutable bundle of CSS values substituted into inline
//! `style` attributes during cleanup, so exported HTML renders the same in a
//! mail client, a CMS, or a browser with no stylesheet at all.

/// Style values for one theme. All fields are CSS fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub font_family: &'static str,
    pub font_size: &'static str,
    pub line_height: &'static str,
    pub text_color: &'static str,
    pub background: &'static str,
    pub heading_color: &'static str,
    pub link_color: &'static str,
    pub code_font_family: &'static str,
    pub code_background: &'static str,
    pub code_color: &'static str,
    pub border_color: &'static str,
    pub blockquote_border: &'static str,
    pub blockquote_color: &'static str,
    pub table_header_background: &'static str,
}

pub const DEFAULT_THEME: Theme = Theme {
    name: "default",
    font_family: "-apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif",
    font_size: "16px",
    line_height: "1.6",
    text_color: "#222222",
    background: "#ffffff",
    heading_color: "#111111",
    link_color: "#0969da",
    code_font_family: "'SFMono-Regular', Consolas, 'Liberation Mono', Menlo, monospace",
    code_background: "#f5f5f5",
    code_color: "#c7254e",
    border_color: "#dddddd",
    blockquote_border: "#cccccc",
    blockquote_color: "#555555",
    table_header_background: "#f0f0f0",
};

pub const GITHUB_THEME: Theme = Theme {
    name: "github",
    font_family: "-apple-system, BlinkMacSystemFont, 'Segoe UI', 'Noto Sans', Helvetica, Arial, sans-serif",
    font_size: "16px",
    line_height: "1.5",
    text_color: "#1f2328",
    background: "#ffffff",
    heading_color: "#1f2328",
    link_color: "#0969da",
    code_font_family: "ui-monospace, SFMono-Regular, 'SF Mono', Menlo, Consolas, monospace",
    code_background: "#f6f8fa",
    code_color: "#1f2328",
    border_color: "#d1d9e0",
    blockquote_border: "#d1d9e0",
    blockquote_color: "#59636e",
    table_header_background: "#f6f8fa",
};

pub const ACADEMIC_THEME: Theme = Theme {
    name: "academic",
    font_family: "'Latin Modern Roman', 'Computer Modern', Georgia, 'Times New Roman', serif",
    font_size: "17px",
    line_height: "1.7",
    text_color: "#1a1a1a",
    background: "#ffffff",
    heading_color: "#000000",
    link_color: "#1a4480",
    code_font_family: "'Latin Modern Mono', 'Courier New', monospace",
    code_background: "#f7f7f7",
    code_color: "#1a1a1a",
    border_color: "#999999",
    blockquote_border: "#666666",
    blockquote_color: "#333333",
    table_header_background: "#eeeeee",
};

pub const SEPIA_THEME: Theme = Theme {
    name: "sepia",
    font_family: "Charter, 'Bitstream Charter', 'Sitka Text', Cambria, serif",
    font_size: "17px",
    line_height: "1.65",
    text_color: "#433422",
    background: "#f4ecd8",
    heading_color: "#2e2416",
    link_color: "#8a4b08",
    code_font_family: "Menlo, Consolas, monospace",
    code_background: "#ebe0c5",
    code_color: "#5c3d1e",
    border_color: "#c9b995",
    blockquote_border: "#b59f70",
    blockquote_color: "#5c4a32",
    table_header_background: "#e8dcbf",
};

const THEMES: &[&Theme] = &[&DEFAULT_THEME, &GITHUB_THEME, &ACADEMIC_THEME, &SEPIA_THEME];

/// Look up a theme by name (case-insensitive). Unknown names yield [`DEFAULT_THEME`].
pub fn lookup_theme(name: &str) -> &'static Theme {
    let wanted = name.trim();
    THEMES
        .iter()
        .copied()
        .find(|t| t.name.eq_ignore_ascii_case(wanted))
        .unwrap_or(&DEFAULT_THEME)
}

/// Names of all built-in themes, in display order.
pub fn theme_names() -> impl Iterator<Item = &'static str> {
    THEMES.iter().map(|t| t.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_theme() {
        assert_eq!(lookup_theme("github").name, "github");
        assert_eq!(lookup_theme("ACADEMIC").name, "academic");
    }

    #[test]
    fn unknown_theme_falls_back_to_default() {
        assert_eq!(lookup_theme("neon-cyberpunk"), &DEFAULT_THEME);
        assert_eq!(lookup_theme(""), &DEFAULT_THEME);
    }

    #[test]
    fn names_are_unique() {
        let names: Vec<_> = theme_names().collect();
        let mut dedup = names.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(names.len(), dedup.len());
    }
}
