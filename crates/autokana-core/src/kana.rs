use crate::config::Script;

/// Prolonged sound mark. Shared by both syllabaries.
pub const PROLONGED_SOUND_MARK: char = 'ー';

/// Distance between a hiragana code point and its katakana counterpart.
pub const KATAKANA_OFFSET: u32 = 0x60;

const HIRAGANA_FIRST: char = 'ぁ'; // U+3041
const HIRAGANA_LAST: char = 'ん'; // U+3093
const KATAKANA_FIRST: char = 'ァ'; // U+30A1
const KATAKANA_LAST: char = 'ン'; // U+30F3

/// Characters that may appear in a raw (unconverted) composition segment.
pub fn is_reading_char(c: char) -> bool {
    matches!(c, HIRAGANA_FIRST..=HIRAGANA_LAST | PROLONGED_SOUND_MARK)
}

/// Collects every reading character of `raw`, in order.
///
/// The caller compares the length of the result with the length of `raw` to
/// tell raw keystrokes apart from a conversion candidate.
pub fn extract_reading(raw: &str) -> Vec<char> {
    raw.chars().filter(|&c| is_reading_char(c)).collect()
}

pub fn to_katakana(c: char) -> char {
    match c {
        HIRAGANA_FIRST..=HIRAGANA_LAST => char::from_u32(c as u32 + KATAKANA_OFFSET).unwrap_or(c),
        _ => c,
    }
}

pub fn to_hiragana(c: char) -> char {
    match c {
        KATAKANA_FIRST..=KATAKANA_LAST => char::from_u32(c as u32 - KATAKANA_OFFSET).unwrap_or(c),
        _ => c,
    }
}

/// Renders an extracted reading run in the requested script.
pub fn render(kana: &[char], script: Script) -> String {
    match script {
        Script::Hiragana => kana.iter().collect(),
        Script::Katakana => kana.iter().map(|&c| to_katakana(c)).collect(),
    }
}
