//! Default colors for projects and tags

use std::sync::OnceLock;

use regex::Regex;

/// Colors offered for new projects, in assignment order
pub const PROJECT_COLORS: [&str; 10] = [
    "#3b82f6", "#8b5cf6", "#ec4899", "#f97316", "#22c55e", "#06b6d4", "#f43f5e", "#a855f7",
    "#14b8a6", "#eab308",
];

/// Colors offered for new tags, in assignment order
pub const TAG_COLORS: [&str; 10] = [
    "#60a5fa", "#a78bfa", "#f472b6", "#fb923c", "#4ade80", "#22d3ee", "#fbbf24", "#e879f9",
    "#2dd4bf", "#f87171",
];

/// Pick a palette color round-robin from how many entities already exist.
#[must_use]
pub fn default_color(palette: &[&'static str], existing: usize) -> &'static str {
    palette.get(existing % palette.len().max(1)).copied().unwrap_or("#64748b")
}

/// Check for a `#rrggbb` color string.
#[must_use]
pub fn is_hex_color(value: &str) -> bool {
    static HEX: OnceLock<Regex> = OnceLock::new();
    HEX.get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("Invalid regex"))
        .is_match(value)
}

/// Black or white, whichever reads better on top of `hex`.
///
/// Invalid colors fall back to black text.
#[must_use]
pub fn contrast_color(hex: &str) -> &'static str {
    if !is_hex_color(hex) {
        return "#000000";
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_or(0.0, f64::from)
    };
    let luminance = channel(5..7).mul_add(
        0.114,
        channel(1..3).mul_add(0.299, channel(3..5) * 0.587),
    ) / 255.0;
    if luminance > 0.5 {
        "#000000"
    } else {
        "#ffffff"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_color_wraps_around() {
        assert_eq!(default_color(&PROJECT_COLORS, 0), "#3b82f6");
        assert_eq!(default_color(&PROJECT_COLORS, 10), "#3b82f6");
        assert_eq!(default_color(&TAG_COLORS, 3), "#fb923c");
    }

    #[test]
    fn hex_color_validation() {
        assert!(is_hex_color("#A1b2C3"));
        assert!(!is_hex_color("A1B2C3"));
        assert!(!is_hex_color("#abc"));
        assert!(!is_hex_color("#gggggg"));
    }

    #[test]
    fn contrast_prefers_dark_text_on_light_colors() {
        assert_eq!(contrast_color("#ffffff"), "#000000");
        assert_eq!(contrast_color("#000000"), "#ffffff");
        assert_eq!(contrast_color("#eab308"), "#000000");
        assert_eq!(contrast_color("#3b82f6"), "#ffffff");
    }
}
