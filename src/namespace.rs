//! The four namespace declarations carried by the `FictionBook` root element.
//!
//! Every document this crate decodes or encodes is healed to the canonical set:
//! a missing or wrong declaration is replaced, a correct one is left alone.

use crate::error::{NamespaceError, NamespaceMismatch};

/// Default namespace of FB2 elements (`xmlns`).
pub const XMLNS_FICTIONBOOK: &str = "http://www.gribuser.ru/xml/fictionbook/2.0";
/// XLink namespace used for image and link hrefs (`xmlns:l`).
pub const XMLNS_XLINK: &str = "http://www.w3.org/1999/xlink";
/// Genre list namespace (`xmlns:genre`).
pub const XMLNS_GENRE: &str = "http://www.gribuser.ru/xml/fictionbook/2.0/genres";
/// XML Schema namespace (`xmlns:xs`).
pub const XMLNS_XS: &str = "http://www.w3.org/2001/XMLSchema";

/// Prefix the encoder binds [`XMLNS_XLINK`] to.
pub const XLINK_PREFIX: &str = "l";

/// Root namespace declarations. `None` means the attribute was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Namespaces {
    pub fictionbook: Option<String>,
    pub xlink: Option<String>,
    pub genre: Option<String>,
    pub xs: Option<String>,
}

impl Namespaces {
    /// The canonical declaration set.
    pub fn canonical() -> Self {
        Self {
            fictionbook: Some(XMLNS_FICTIONBOOK.to_string()),
            xlink: Some(XMLNS_XLINK.to_string()),
            genre: Some(XMLNS_GENRE.to_string()),
            xs: Some(XMLNS_XS.to_string()),
        }
    }

    /// Check every declaration, collecting all mismatches.
    pub fn validate(&self) -> Result<(), NamespaceError> {
        let mismatches: Vec<NamespaceMismatch> = self
            .slots()
            .into_iter()
            .filter(|(value, expected, _)| value.as_deref() != Some(*expected))
            .map(|(_, _, mismatch)| mismatch)
            .collect();

        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(NamespaceError { mismatches })
        }
    }

    /// Overwrite every missing or incorrect declaration with its canonical URI.
    ///
    /// Returns the declarations that were repaired.
    pub fn normalize(&mut self) -> Vec<NamespaceMismatch> {
        let mut repaired = Vec::new();
        for (value, expected, mismatch) in self.slots_mut() {
            if value.as_deref() != Some(expected) {
                *value = Some(expected.to_string());
                repaired.push(mismatch);
            }
        }
        repaired
    }

    /// Consuming variant of [`Namespaces::normalize`].
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    fn slots(&self) -> [(&Option<String>, &'static str, NamespaceMismatch); 4] {
        [
            (&self.fictionbook, XMLNS_FICTIONBOOK, NamespaceMismatch::FictionBook),
            (&self.xlink, XMLNS_XLINK, NamespaceMismatch::XLink),
            (&self.genre, XMLNS_GENRE, NamespaceMismatch::Genre),
            (&self.xs, XMLNS_XS, NamespaceMismatch::Xs),
        ]
    }

    fn slots_mut(&mut self) -> [(&mut Option<String>, &'static str, NamespaceMismatch); 4] {
        [
            (&mut self.fictionbook, XMLNS_FICTIONBOOK, NamespaceMismatch::FictionBook),
            (&mut self.xlink, XMLNS_XLINK, NamespaceMismatch::XLink),
            (&mut self.genre, XMLNS_GENRE, NamespaceMismatch::Genre),
            (&mut self.xs, XMLNS_XS, NamespaceMismatch::Xs),
        ]
    }
}
