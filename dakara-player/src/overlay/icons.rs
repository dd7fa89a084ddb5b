//! Font Awesome icon names to glyphs

/// Glyph used for unknown icon names
const FALLBACK: char = ' ';

const ICON_MAP: &[(&str, u32)] = &[
    ("book", 0xf02d),
    ("calendar", 0xf073),
    ("film", 0xf008),
    ("gamepad", 0xf11b),
    ("globe", 0xf0ac),
    ("headphones", 0xf025),
    ("heart", 0xf004),
    ("microphone", 0xf130),
    ("music", 0xf001),
    ("play", 0xf04b),
    ("question", 0xf128),
    ("star", 0xf005),
    ("tv", 0xf26c),
    ("user", 0xf007),
    ("video-camera", 0xf03d),
];

/// Glyph of the icon `name`, a space if unknown
pub fn glyph(name: &str) -> char {
    ICON_MAP
        .iter()
        .find(|(icon, _)| *icon == name)
        .and_then(|(_, code)| char::from_u32(*code))
        .unwrap_or(FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_icon() {
        assert_eq!(glyph("tv"), '\u{f26c}');
    }

    #[test]
    fn test_unknown_icon_is_space() {
        assert_eq!(glyph("unicorn"), ' ');
        assert_eq!(glyph(""), ' ');
    }
}
