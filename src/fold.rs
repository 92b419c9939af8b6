use std::ops::Range;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldedText {
    pub text: String,
    origin: Vec<Range<usize>>,
}

impl FoldedText {
    /// Maps a byte range of the folded text back to the byte range of the
    /// original characters that produced it.
    pub fn original_range(&self, folded: Range<usize>) -> Option<Range<usize>> {
        if folded.start >= folded.end || folded.end > self.origin.len() {
            return None;
        }

        let start = self.origin[folded.start].start;
        let end = self.origin[folded.end - 1].end;
        Some(start..end)
    }

    fn push(&mut self, ch: char, source: Range<usize>) {
        if ch.is_whitespace() {
            if self.text.ends_with(' ') {
                if let Some(last) = self.origin.last_mut() {
                    last.end = last.end.max(source.end);
                }
                return;
            }
            self.text.push(' ');
            self.origin.push(source);
            return;
        }

        self.text.push(ch);
        for _ in 0..ch.len_utf8() {
            self.origin.push(source.clone());
        }
    }
}

pub fn fold(input: &str) -> String {
    fold_with_map(input).text.trim().to_string()
}

pub fn fold_with_map(input: &str) -> FoldedText {
    let mut folded = FoldedText {
        text: String::with_capacity(input.len()),
        origin: Vec::with_capacity(input.len()),
    };

    for (offset, ch) in input.char_indices() {
        let source = offset..offset + ch.len_utf8();
        if ch.is_whitespace() {
            folded.push(' ', source);
            continue;
        }

        for lowered in ch.to_lowercase() {
            for decomposed in std::iter::once(lowered).nfkd() {
                for out in decomposed.to_lowercase() {
                    if is_combining_mark(out) {
                        continue;
                    }
                    match latin_base(out) {
                        Some(base) => {
                            for base_ch in base.chars() {
                                folded.push(base_ch, source.clone());
                            }
                        }
                        None => folded.push(out, source.clone()),
                    }
                }
            }
        }
    }

    folded
}

// Letters with a stroke or ligature have no canonical decomposition.
fn latin_base(ch: char) -> Option<&'static str> {
    match ch {
        'ł' => Some("l"),
        'đ' => Some("d"),
        'ø' => Some("o"),
        'ħ' => Some("h"),
        'ı' => Some("i"),
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        _ => None,
    }
}
