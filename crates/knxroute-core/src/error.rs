use core::fmt;

/// Failure to parse a textual address or address block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    InvalidSyntax,
    OutOfRange,
    InvalidLength,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty address"),
            Self::InvalidSyntax => f.write_str("invalid address syntax"),
            Self::OutOfRange => f.write_str("address component out of range"),
            Self::InvalidLength => f.write_str("invalid address block length"),
        }
    }
}

impl std::error::Error for ParseError {}
