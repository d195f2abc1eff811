//! Grapheme segmentation and display-width measurement.
//!
//! Cursor advancement assumes Unicode grapheme clusters; the width of a
//! cluster is the protocol-defined cell width, not a measured glyph width.
//! All width decisions flow through [`egc_width`] so that the screen, the
//! renderer, and the status bar can never disagree about how many cells a
//! cluster occupies.

mod width;

pub use width::egc_width;

use unicode_segmentation::UnicodeSegmentation;

/// Iterate the extended grapheme clusters of a string.
pub fn graphemes(text: &str) -> impl Iterator<Item = &str> {
    text.graphemes(true)
}

/// The first grapheme cluster of a string, if any.
pub fn first_grapheme(text: &str) -> Option<&str> {
    text.graphemes(true).next()
}

/// Sum of cluster widths; the number of terminal columns `text` occupies.
pub fn text_width(text: &str) -> u32 {
    graphemes(text).map(|egc| u32::from(egc_width(egc))).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segmentation_keeps_clusters_whole() {
        let clusters: Vec<&str> = graphemes("e\u{301}x").collect();
        assert_eq!(clusters, vec!["e\u{301}", "x"]);
    }

    #[test]
    fn text_width_sums_clusters() {
        assert_eq!(text_width("abc"), 3);
        assert_eq!(text_width("日本"), 4);
        assert_eq!(text_width(""), 0);
    }
}
