#![allow(non_upper_case_globals)]

//! Character constants and predicates used by the source lexer.

pub const EOF: char = '\0';
pub const TAB: char = '\t';
pub const NEWLINE: char = '\n';
pub const FF: char = '\x0C';
pub const RETURN: char = '\r';
pub const SPACE: char = ' ';
pub const HASH: char = '#';
pub const SQ: char = '\'';
pub const DQ: char = '"';
pub const PERIOD: char = '.';
pub const BACKSLASH: char = '\\';
pub const UNDERSCORE: char = '_';

pub const A: char = 'A';
pub const F: char = 'F';
pub const Z: char = 'Z';
pub const a: char = 'a';
pub const f: char = 'f';
pub const z: char = 'z';

pub const ZERO: char = '0';
pub const NINE: char = '9';

/// Whitespace that does not end a logical line
pub fn is_inline_whitespace(ch: char) -> bool {
    ch == SPACE || ch == TAB || ch == FF
}

pub fn is_new_line(ch: char) -> bool {
    ch == NEWLINE || ch == RETURN
}

pub fn is_digit(ch: char) -> bool {
    (ZERO..=NINE).contains(&ch)
}

pub fn is_ascii_letter(ch: char) -> bool {
    (a..=z).contains(&ch) || (A..=Z).contains(&ch)
}

pub fn is_ascii_hex_digit(ch: char) -> bool {
    (a..=f).contains(&ch) || (A..=F).contains(&ch) || is_digit(ch)
}

pub fn is_quote(ch: char) -> bool {
    ch == SQ || ch == DQ
}

/// Check if character can start an identifier
pub fn is_identifier_start(ch: char) -> bool {
    is_ascii_letter(ch) || ch == UNDERSCORE || (!ch.is_ascii() && ch.is_alphabetic())
}

/// Check if character can be part of an identifier
pub fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || is_digit(ch)
}
