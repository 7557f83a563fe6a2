//! Statement parsing.
//!
//! A program line holds one or more statements separated by `;`:
//!
//! ```text
//! [:]SEG[:SEG...][?] [arg[,arg...]]
//! ```
//!
//! A leading `:` anchors the path at the root; a leading `*` marks an
//! IEEE-488.2 common command (also rooted). Anything else is resolved
//! relative to the node of the previous statement on the same line.
//! Quoted arguments (`"..."` or `'...'`) are opaque to both delimiters.

use crate::error::{Result, ScpiError};
use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::opt,
    IResult,
};
use smallvec::SmallVec;

/// Statement delimiter.
pub const STATEMENT_DELIMITER: char = ';';
/// Parameter delimiter.
pub const PARAMETER_DELIMITER: char = ',';
/// Path segment delimiter.
pub const PATH_DELIMITER: char = ':';
/// Query marker.
pub const QUERY_MARKER: char = '?';

/// Where path resolution starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Leading `:`.
    Root,
    /// Leading `*`.
    Common,
    /// No prefix: continue at the previous statement's node.
    Relative,
}

/// A parsed statement borrowing from its line.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement<'a> {
    /// Resolution start.
    pub anchor: Anchor,
    /// Header as written, without the root marker and query marker.
    pub header: &'a str,
    /// Path segments; the last one names the leaf.
    pub segments: SmallVec<[&'a str; 6]>,
    /// Whether the header ended in the query marker.
    pub query: bool,
    /// Trimmed argument tokens.
    pub args: SmallVec<[&'a str; 4]>,
}

impl<'a> Statement<'a> {
    /// Parse a single statement (no `;`).
    pub fn parse(input: &'a str) -> Result<Self> {
        let syntax = || ScpiError::Syntax {
            statement: input.trim().to_string(),
        };

        let (_, (anchor, header, query, params)) = parse_statement(input.trim()).map_err(|_| syntax())?;

        let segments: SmallVec<[&str; 6]> = header.split(PATH_DELIMITER).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(syntax());
        }

        let args = if params.is_empty() {
            SmallVec::new()
        } else {
            split_unquoted(params, PARAMETER_DELIMITER)
                .into_iter()
                .map(str::trim)
                .collect()
        };

        Ok(Self {
            anchor,
            header,
            segments,
            query,
            args,
        })
    }

    /// Argument tokens as owned strings.
    pub fn owned_args(&self) -> Vec<String> {
        self.args.iter().map(|a| a.to_string()).collect()
    }
}

fn is_header_char(c: char) -> bool {
    !c.is_whitespace() && c != QUERY_MARKER
}

/// Split `[:]header[?] params` into its parts.
fn parse_statement(input: &str) -> IResult<&str, (Anchor, &str, bool, &str)> {
    let (input, root) = opt(char(PATH_DELIMITER))(input)?;
    let (input, header) = take_while1(is_header_char)(input)?;
    let (input, query) = opt(char(QUERY_MARKER))(input)?;

    // The header must end at whitespace or at the end of the statement
    if input.chars().next().is_some_and(|c| !c.is_whitespace()) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Space,
        )));
    }
    let (params, _) = multispace0(input)?;

    let anchor = if header.starts_with('*') {
        Anchor::Common
    } else if root.is_some() {
        Anchor::Root
    } else {
        Anchor::Relative
    };
    Ok(("", (anchor, header, query.is_some(), params)))
}

/// Split on `delimiter`, ignoring delimiters inside single or double quotes.
///
/// An unterminated quote extends to the end of the input.
pub fn split_unquoted(input: &str, delimiter: char) -> SmallVec<[&str; 4]> {
    let mut parts = SmallVec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == delimiter => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Split a program line into statement texts, dropping empty ones.
pub fn split_line(line: &str) -> SmallVec<[&str; 4]> {
    split_unquoted(line.trim_end_matches(['\r', '\n']), STATEMENT_DELIMITER)
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect()
}
