/// Text normalization shared by the store, the match index, and the query path.
///
/// Every question key is produced by [`normalize`]. Building the index and
/// answering a query must go through the same function, otherwise scores
/// silently drift.
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalize free text into a comparable match key.
///
/// Steps: NFKC, Arabic diacritics and tatweel removed, Alef/Yeh/Waw/Teh
/// Marbuta variants folded, Arabic-Indic digits mapped to ASCII, lowercase,
/// NFKC again, punctuation and symbols replaced by a space, whitespace
/// collapsed. Combining marks stay attached to the word they follow.
///
/// The output is a fixed point: `normalize(&normalize(s)) == normalize(s)`.
#[must_use]
pub fn normalize(text: &str) -> String {
    let lowered: String = text
        .nfkc()
        .filter(|c| !is_arabic_mark(*c))
        .map(fold_char)
        .flat_map(char::to_lowercase)
        .collect();

    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    // Lowercasing can emit combining marks ('İ' becomes 'i' + U+0307)
    for c in lowered.nfkc() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else if is_combining_mark(c) && !pending_space && !out.is_empty() {
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Split a normalized key into tokens.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split(' ').filter(|t| !t.is_empty())
}

/// Diacritics (harakat, Quranic marks) and tatweel.
fn is_arabic_mark(c: char) -> bool {
    matches!(c,
        '\u{0617}'..='\u{061A}'
        | '\u{064B}'..='\u{0652}'
        | '\u{0657}'..='\u{065F}'
        | '\u{0670}'
        | '\u{06D6}'..='\u{06ED}'
        | '\u{0640}')
}

fn fold_char(c: char) -> char {
    match c {
        'أ' | 'إ' | 'آ' => 'ا',
        'ى' => 'ي',
        'ؤ' => 'و',
        'ئ' => 'ي',
        'ة' => 'ه',
        '\u{0660}'..='\u{0669}' => ascii_digit(c as u32 - 0x0660),
        '\u{06F0}'..='\u{06F9}' => ascii_digit(c as u32 - 0x06F0),
        _ => c,
    }
}

fn ascii_digit(offset: u32) -> char {
    char::from_digit(offset, 10).unwrap_or('0')
}
