//! Line lexer for `.kasm` sources.
//!
//! Tokens are whitespace-delimited; `;` starts a comment running to the end
//! of the line, and trailing commas on tokens are tolerated and stripped.
//! Spaces inside character literals are not supported by the format (the
//! `\s` escape exists for that), so splitting on whitespace is lossless.

use crate::error::SourcePos;

/// One token with its source anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token text, trailing commas removed.
    pub text: &'a str,
    /// 1-based line and column of the token's first byte.
    pub pos: SourcePos,
}

/// Split a source into per-line token lists. Blank and comment-only lines
/// are dropped; line numbers are preserved in the token anchors.
pub fn lex(source: &str) -> Vec<Vec<Token<'_>>> {
    source
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let code = match raw.split_once(';') {
                Some((before, _comment)) => before,
                None => raw,
            };
            let line = idx as u32 + 1;
            let tokens: Vec<_> = words(code)
                .filter_map(|(col, word)| {
                    let text = word.trim_end_matches(',');
                    (!text.is_empty()).then_some(Token {
                        text,
                        pos: SourcePos::new(line, col as u32 + 1),
                    })
                })
                .collect();
            (!tokens.is_empty()).then_some(tokens)
        })
        .collect()
}

/// Whitespace-separated words with their byte offsets.
fn words(code: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut rest = code;
    let mut base = 0;
    std::iter::from_fn(move || {
        let skip = rest.len() - rest.trim_start().len();
        base += skip;
        rest = &rest[skip..];
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        let word = &rest[..end];
        let start = base;
        base += end;
        rest = &rest[end..];
        Some((start, word))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blanks_are_dropped() {
        let lines = lex("; header\n\nCLZ a.B ; own name\n  RET r\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][0].text, "CLZ");
        assert_eq!(lines[0][1].text, "a.B");
        assert_eq!(lines[0][0].pos, SourcePos::new(3, 1));
        assert_eq!(lines[1][0].pos, SourcePos::new(4, 3));
    }

    #[test]
    fn trailing_commas_are_stripped() {
        let lines = lex("SINV d m.f a, b, c\n");
        let texts: Vec<_> = lines[0].iter().map(|t| t.text).collect();
        assert_eq!(texts, ["SINV", "d", "m.f", "a", "b", "c"]);
    }

    #[test]
    fn columns_are_one_based_byte_offsets() {
        let lines = lex("LBL start");
        assert_eq!(lines[0][1].pos, SourcePos::new(1, 5));
    }
}
