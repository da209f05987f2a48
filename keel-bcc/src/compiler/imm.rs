//! Immediate-literal parsing.
//!
//! Integer literals take an optional `0b`/`0o`/`0x` base prefix, floats go
//! through IEEE-754 conformant string conversion, and character literals
//! pack one to four escaped bytes big-endian into a 32-bit immediate.
//! Narrowing to a 16- or 24-bit field checks the signed window.

use crate::error::ErrorKind;
use std::num::IntErrorKind;

/// Parse a 32-bit integer literal.
pub fn parse_i32(lit: &str) -> Result<i32, ErrorKind> {
    let parsed = match radix_split(lit) {
        Some((radix, digits)) => i32::from_str_radix(digits, radix),
        None => lit.parse(),
    };
    parsed.map_err(|e| int_error(lit, 32, e.kind()))
}

/// Parse a 64-bit integer literal.
pub fn parse_i64(lit: &str) -> Result<i64, ErrorKind> {
    let parsed = match radix_split(lit) {
        Some((radix, digits)) => i64::from_str_radix(digits, radix),
        None => lit.parse(),
    };
    parsed.map_err(|e| int_error(lit, 64, e.kind()))
}

/// Parse a single-precision float literal.
pub fn parse_f32(lit: &str) -> Result<f32, ErrorKind> {
    lit.parse().map_err(|_| unparseable(lit, "a float"))
}

/// Parse a double-precision float literal.
pub fn parse_f64(lit: &str) -> Result<f64, ErrorKind> {
    lit.parse().map_err(|_| unparseable(lit, "a double"))
}

/// A 32-bit `LI` immediate: a character literal when single-quoted,
/// otherwise an integer literal.
pub fn int_immediate(lit: &str) -> Result<u32, ErrorKind> {
    if lit.starts_with('\'') {
        char_literal(lit)
    } else {
        parse_i32(lit).map(|v| v as u32)
    }
}

/// Narrow an integer literal into the signed 24-bit window, returning the
/// masked field bits.
pub fn to_imm24(lit: &str) -> Result<u32, ErrorKind> {
    let value = parse_i32(lit)?;
    if !(-(1 << 23)..1 << 23).contains(&value) {
        return Err(overflow(lit, 24));
    }
    Ok(value as u32 & 0x00ff_ffff)
}

/// Narrow an integer literal into the signed 16-bit window.
pub fn to_imm16(lit: &str) -> Result<u16, ErrorKind> {
    let value = parse_i32(lit)?;
    if i16::try_from(value).is_err() {
        return Err(overflow(lit, 16));
    }
    Ok(value as u16)
}

/// One to four bytes between single quotes, C escapes allowed, packed
/// big-endian with the first byte most significant.
pub fn char_literal(lit: &str) -> Result<u32, ErrorKind> {
    let inner = lit
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(|| bad_char(lit))?;
    let mut packed: u32 = 0;
    let mut count = 0usize;
    let mut bytes = inner.bytes();
    while let Some(byte) = bytes.next() {
        let value = if byte == b'\\' {
            let escape = bytes.next().ok_or_else(|| bad_char(lit))?;
            unescape(escape).ok_or_else(|| bad_char(lit))?
        } else {
            byte
        };
        count += 1;
        if count > 4 {
            return Err(bad_char(lit));
        }
        packed = (packed << 8) | value as u32;
    }
    if count == 0 {
        return Err(bad_char(lit));
    }
    Ok(packed)
}

fn unescape(byte: u8) -> Option<u8> {
    match byte {
        b'a' => Some(0x07),
        b'b' => Some(0x08),
        b'e' => Some(0x1b),
        b'f' => Some(0x0c),
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b's' => Some(b' '),
        b't' => Some(b'\t'),
        b'v' => Some(0x0b),
        b'\\' => Some(b'\\'),
        b'\'' => Some(b'\''),
        b'"' => Some(b'"'),
        b'?' => Some(b'?'),
        _ => None,
    }
}

fn radix_split(lit: &str) -> Option<(u32, &str)> {
    let bytes = lit.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'b' | b'B' => Some((2, &lit[2..])),
            b'o' | b'O' => Some((8, &lit[2..])),
            b'x' | b'X' => Some((16, &lit[2..])),
            _ => None,
        }
    } else {
        None
    }
}

fn int_error(lit: &str, bits: u32, kind: &IntErrorKind) -> ErrorKind {
    match kind {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => overflow(lit, bits),
        _ => unparseable(lit, "an integer"),
    }
}

fn unparseable(lit: &str, wanted: &'static str) -> ErrorKind {
    ErrorKind::UnparseableLiteral {
        literal: lit.to_owned(),
        wanted,
    }
}

fn overflow(lit: &str, bits: u32) -> ErrorKind {
    ErrorKind::ImmediateOverflow {
        literal: lit.to_owned(),
        bits,
    }
}

fn bad_char(lit: &str) -> ErrorKind {
    ErrorKind::BadCharLiteral(lit.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_prefixes_parse() {
        assert_eq!(parse_i32("42"), Ok(42));
        assert_eq!(parse_i32("-42"), Ok(-42));
        assert_eq!(parse_i32("0b101"), Ok(5));
        assert_eq!(parse_i32("0o17"), Ok(15));
        assert_eq!(parse_i32("0XfF"), Ok(255));
        assert_eq!(parse_i64("0x1234567890ABCDEF"), Ok(0x1234_5678_90ab_cdef));
        assert!(matches!(
            parse_i32("12x"),
            Err(ErrorKind::UnparseableLiteral { .. })
        ));
        assert!(matches!(
            parse_i32("0x1FFFFFFFF"),
            Err(ErrorKind::ImmediateOverflow { bits: 32, .. })
        ));
    }

    #[test]
    fn narrowing_checks_the_signed_window() {
        assert_eq!(to_imm24("-1"), Ok(0x00ff_ffff));
        assert_eq!(to_imm24("8388607"), Ok(0x007f_ffff));
        assert!(matches!(
            to_imm24("8388608"),
            Err(ErrorKind::ImmediateOverflow { bits: 24, .. })
        ));
        assert_eq!(to_imm16("-32768"), Ok(0x8000));
        assert!(matches!(
            to_imm16("32768"),
            Err(ErrorKind::ImmediateOverflow { bits: 16, .. })
        ));
    }

    #[test]
    fn char_literals_pack_big_endian() {
        assert_eq!(char_literal("'a'"), Ok(0x61));
        assert_eq!(char_literal("'ab'"), Ok(0x6162));
        assert_eq!(char_literal("'abcd'"), Ok(0x6162_6364));
        assert_eq!(char_literal("'\\n'"), Ok(0x0a));
        assert_eq!(char_literal("'a\\tb'"), Ok(0x6109_62));
        assert_eq!(int_immediate("'\\s'"), Ok(0x20));
        assert!(matches!(
            char_literal("'abcde'"),
            Err(ErrorKind::BadCharLiteral(_))
        ));
        assert!(matches!(char_literal("''"), Err(ErrorKind::BadCharLiteral(_))));
        assert!(matches!(char_literal("'a"), Err(ErrorKind::BadCharLiteral(_))));
        assert!(matches!(
            char_literal("'\\q'"),
            Err(ErrorKind::BadCharLiteral(_))
        ));
    }

    #[test]
    fn floats_use_ieee_string_conversion() {
        assert_eq!(parse_f32("1.5"), Ok(1.5));
        assert_eq!(parse_f64("-2.25e3"), Ok(-2250.0));
        assert!(matches!(
            parse_f32("1.5.2"),
            Err(ErrorKind::UnparseableLiteral { .. })
        ));
    }
}
