//! SCPI mnemonic matching.
//!
//! Node and leaf names are registered in mnemonic notation: the uppercase
//! head is the short form and the whole name is the long form. `FREQuency`
//! answers to `FREQ` and to `FREQUENCY`, in any letter case, but not to
//! `FREQU`. Input written in mnemonic notation is reduced the same way, so
//! `FREQu` is read as `FREQ`.
//!
//! The short form is the name with every trailing lowercase ASCII letter
//! removed. A name without a lowercase tail (`*IDN`, `TRIG`) has identical
//! short and long forms. A name that is lowercase throughout keeps itself
//! as its short form.

/// Short form of a mnemonic name.
#[inline]
pub fn short_form(name: &str) -> &str {
    let short = name.trim_end_matches(|c: char| c.is_ascii_lowercase());
    if short.is_empty() {
        name
    } else {
        short
    }
}

/// Check whether an input segment addresses the registered `name`.
///
/// Both forms of the segment are compared case-insensitively against both
/// forms of the name. A segment without a lowercase tail (`FREQ`, `freq`)
/// is its own short form.
#[inline]
pub fn matches(name: &str, segment: &str) -> bool {
    collides(name, segment)
}

/// Check whether two registered names would answer to a common segment.
///
/// Used for sibling collision detection: both sides are in mnemonic
/// notation, so every pairing of short and long forms is compared.
pub fn collides(a: &str, b: &str) -> bool {
    let (sa, sb) = (short_form(a), short_form(b));
    a.eq_ignore_ascii_case(b)
        || a.eq_ignore_ascii_case(sb)
        || sa.eq_ignore_ascii_case(b)
        || sa.eq_ignore_ascii_case(sb)
}

/// Check that a name can be registered in the tree.
///
/// Names must be non-empty and may not contain path, statement or
/// parameter delimiters, the query marker, quotes or whitespace.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| matches!(c, ':' | ';' | '?' | ',' | '"' | '\'') || c.is_whitespace())
}
