//! Attribution colors and their hex values.

/// Named colors the color-coding stage may emit.
pub const PALETTE: [(&str, &str); 7] = [
    ("black", "000000"),
    ("darkblue", "00008B"),
    ("darkred", "8B0000"),
    ("green", "008000"),
    ("purple", "800080"),
    ("orange", "FFA500"),
    ("teal", "008080"),
];

/// Colors handed out to sources, in order. Black is kept for text that
/// comes from no single source.
pub const ATTRIBUTION_COLORS: [&str; 6] = ["darkblue", "darkred", "green", "purple", "orange", "teal"];

pub const UNATTRIBUTED: &str = "black";

const FALLBACK: &str = "000000";

/// Hex value (uppercase, no `#`) for a palette name or a `#rgb`/`#rrggbb`
/// literal. Anything else falls back to black.
pub fn color_hex(color: &str) -> String {
    let color = color.trim();
    if let Some(hex) = color.strip_prefix('#') {
        if hex.chars().all(|c| c.is_ascii_hexdigit()) {
            match hex.len() {
                6 => return hex.to_ascii_uppercase(),
                3 => return hex.chars().flat_map(|c| [c, c]).collect::<String>().to_ascii_uppercase(),
                _ => {}
            }
        }
    }
    if let Some((_, hex)) = PALETTE.iter().find(|(name, _)| name.eq_ignore_ascii_case(color)) {
        return hex.to_string();
    }
    tracing::warn!("Unknown color '{}', using black", color);
    FALLBACK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_names() {
        assert_eq!(color_hex("darkblue"), "00008B");
        assert_eq!(color_hex("DarkRed"), "8B0000");
        assert_eq!(color_hex(" orange "), "FFA500");
        assert_eq!(color_hex("teal"), "008080");
    }

    #[test]
    fn test_attribution_colors_are_distinct_and_mapped() {
        for (i, color) in ATTRIBUTION_COLORS.iter().enumerate() {
            assert!(!ATTRIBUTION_COLORS[..i].contains(color));
            assert_ne!(*color, UNATTRIBUTED);
            assert_ne!(color_hex(color), FALLBACK);
        }
    }

    #[test]
    fn test_hex_literals() {
        assert_eq!(color_hex("#00ff00"), "00FF00");
        assert_eq!(color_hex("#abc"), "AABBCC");
    }

    #[test]
    fn test_unknown_colors_fall_back_to_black() {
        assert_eq!(color_hex("chartreuse"), "000000");
        assert_eq!(color_hex("#12"), "000000");
        assert_eq!(color_hex(""), "000000");
    }
}
