//! Error types for FB2 decoding, encoding and namespace validation.

use std::fmt;

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

/// Errors that can occur while decoding an FB2 document.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("No .fb2 entry found in ZIP archive")]
    MissingArchiveEntry,

    #[error("Input is not valid UTF-8 and declares no encoding")]
    Encoding,

    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Malformed attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("Unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("Unknown entity reference &{0};")]
    UnknownEntity(String),

    #[error("Character reference &{0}; is not an XML character")]
    InvalidCharacterReference(String),

    #[error("Character U+{:04X} is not allowed in XML", u32::from(*.0))]
    InvalidCharacter(char),

    #[error("Invalid {field} value: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Root element is <{0}>, expected <FictionBook>")]
    UnexpectedRoot(String),

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Element nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Errors that can occur while encoding an FB2 document.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Character U+{:04X} cannot be written to XML", u32::from(*.0))]
    InvalidCharacter(char),
}

/// One of the four root namespace declarations that is missing or wrong.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceMismatch {
    #[error("missing or incorrect xmlns")]
    FictionBook,
    #[error("missing or incorrect xmlns:l")]
    XLink,
    #[error("missing or incorrect xmlns:genre")]
    Genre,
    #[error("missing or incorrect xmlns:xs")]
    Xs,
}

/// All namespace mismatches found by [`crate::FictionBook::validate_namespaces`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceError {
    pub mismatches: Vec<NamespaceMismatch>,
}

impl NamespaceError {
    /// Whether `mismatch` is among the reported problems.
    pub fn contains(&self, mismatch: NamespaceMismatch) -> bool {
        self.mismatches.contains(&mismatch)
    }
}

impl fmt::Display for NamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, mismatch) in self.mismatches.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{mismatch}")?;
        }
        Ok(())
    }
}

impl std::error::Error for NamespaceError {}

/// Any error produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Namespace check failed:\n{0}")]
    Namespace(#[from] NamespaceError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_error_joins_all_mismatches() {
        let err = NamespaceError {
            mismatches: vec![NamespaceMismatch::FictionBook, NamespaceMismatch::Xs],
        };
        assert_eq!(
            err.to_string(),
            "missing or incorrect xmlns\nmissing or incorrect xmlns:xs"
        );
        assert!(err.contains(NamespaceMismatch::Xs));
        assert!(!err.contains(NamespaceMismatch::Genre));
    }
}
