//! Delimited text encoding for list-valued columns.
//!
//! Every element is escaped and then terminated by U+001F (unit separator),
//! so the empty list encodes to the empty string and a list holding one
//! empty string encodes to a lone terminator. Backslash and the separator
//! are escaped as `\\` and `\u`.

const TERMINATOR: char = '\u{1f}';
const ESCAPE: char = '\\';

/// Error decoding a stored list column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListCodecError {
    /// An escape sequence other than `\\` or `\u`.
    InvalidEscape(Option<char>),
    /// Trailing characters after the last terminator.
    Unterminated(String),
}

impl std::fmt::Display for ListCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListCodecError::InvalidEscape(Some(c)) => write!(f, "invalid escape '\\{}'", c),
            ListCodecError::InvalidEscape(None) => write!(f, "dangling escape at end of list"),
            ListCodecError::Unterminated(rest) => {
                write!(f, "unterminated list element '{}'", rest)
            }
        }
    }
}

impl std::error::Error for ListCodecError {}

pub fn encode_list<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::new();
    for item in items {
        for c in item.as_ref().chars() {
            match c {
                ESCAPE => out.push_str("\\\\"),
                TERMINATOR => out.push_str("\\u"),
                c => out.push(c),
            }
        }
        out.push(TERMINATOR);
    }
    out
}

pub fn decode_list(encoded: &str) -> Result<Vec<String>, ListCodecError> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = encoded.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(ESCAPE) => current.push(ESCAPE),
                Some('u') => current.push(TERMINATOR),
                other => return Err(ListCodecError::InvalidEscape(other)),
            },
            TERMINATOR => items.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        return Err(ListCodecError::Unterminated(current));
    }

    Ok(items)
}
