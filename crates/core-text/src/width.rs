//! Display width of a single grapheme cluster.
//!
//! Precedence order:
//! 1. Emoji composites (ZWJ sequences, flags, keycaps, VS16 presentation)
//!    are two columns.
//! 2. Clusters made only of zero-width scalars (combining marks, ZWJ,
//!    variation selectors) are zero columns and attach to the previous cell.
//! 3. Everything else defers to `unicode-width` on the base scalar.
//!
//! The classifier favors over-estimation: an extra blank cell is harmless,
//! an under-estimate makes every subsequent cell on the row drift.

use unicode_width::UnicodeWidthChar;

const ZWJ: char = '\u{200D}';
const VS15: char = '\u{FE0E}';
const VS16: char = '\u{FE0F}';
const KEYCAP_COMBINING: char = '\u{20E3}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_skin_tone_modifier(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

// Rough Extended Pictographic check covering the primary emoji blocks plus
// the legacy symbol ranges commonly rendered as emoji.
fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

/// Terminal column width of one extended grapheme cluster.
pub fn egc_width(egc: &str) -> u16 {
    let mut chars = egc.chars();
    let Some(first) = chars.next() else {
        return 0;
    };

    // Fast path: a single ASCII scalar.
    if first.is_ascii() && egc.len() == 1 {
        return if first.is_ascii_control() { 0 } else { 1 };
    }

    let mut has_zwj = false;
    let mut has_vs16 = false;
    let mut has_vs15 = false;
    let mut has_keycap = false;
    let mut regional_indicators = usize::from(is_regional_indicator(first));
    let mut pictographic = is_extended_pictographic(first);
    for c in chars {
        match c {
            ZWJ => has_zwj = true,
            VS16 => has_vs16 = true,
            VS15 => has_vs15 = true,
            KEYCAP_COMBINING => has_keycap = true,
            c if is_regional_indicator(c) => regional_indicators += 1,
            c if is_skin_tone_modifier(c) => pictographic = true,
            c if is_extended_pictographic(c) => pictographic = true,
            _ => {}
        }
    }

    if has_keycap || regional_indicators >= 2 {
        return 2;
    }
    if has_vs16 && !has_vs15 {
        return 2;
    }
    if has_zwj && pictographic {
        return 2;
    }

    let base = first.width().unwrap_or(0) as u16;
    if base == 0 {
        // Cluster led by a combining mark or other zero-width scalar.
        return 0;
    }
    if pictographic && base == 1 && !has_vs15 {
        // Pictographic the width tables call narrow; widen conservatively.
        return 2;
    }
    base.min(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii() {
        assert_eq!(egc_width("a"), 1);
        assert_eq!(egc_width(" "), 1);
        assert_eq!(egc_width("\u{7}"), 0);
    }

    #[test]
    fn east_asian_wide() {
        assert_eq!(egc_width("日"), 2);
        assert_eq!(egc_width("한"), 2);
    }

    #[test]
    fn combining_cluster_is_one_cell() {
        assert_eq!(egc_width("e\u{301}"), 1);
    }

    #[test]
    fn lone_combining_mark_is_zero() {
        assert_eq!(egc_width("\u{301}"), 0);
        assert_eq!(egc_width("\u{200D}"), 0);
    }

    #[test]
    fn emoji_composites() {
        assert_eq!(egc_width("🚀"), 2);
        // Family: three pictographs joined by ZWJ.
        assert_eq!(egc_width("👨\u{200D}👩\u{200D}👦"), 2);
        // Flag: two regional indicators.
        assert_eq!(egc_width("🇺🇸"), 2);
        // Keycap.
        assert_eq!(egc_width("1\u{FE0F}\u{20E3}"), 2);
        // VS16 forces emoji presentation of a narrow base.
        assert_eq!(egc_width("\u{2764}\u{FE0F}"), 2);
        // Skin tone modifier.
        assert_eq!(egc_width("👍🏽"), 2);
    }
}
