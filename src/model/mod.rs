//! Core data model for FB2 documents.
//!
//! This module contains:
//! - The [`FictionBook`] root and its namespace declarations
//! - Book metadata (`<description>`: title-info, document-info, publish-info)
//! - Body content (sections, paragraphs, poems, citations, epigraphs)
//! - Embedded binary resources
//!
//! The model is a passive value tree; nothing here validates.

mod binary;
mod body;
mod description;

pub use binary::Binary;
pub use body::{
    Annotation, BlockKind, Body, Cite, Epigraph, Paragraph, Poem, Section, Stanza, Subtitle,
    Title, Verse,
};
pub use description::{
    Author, Coverpage, CustomInfo, Date, Description, DocumentInfo, Image, PublishInfo, Sequence,
    TitleInfo,
};

use crate::error::NamespaceError;
use crate::namespace::Namespaces;

/// An FB2 document.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FictionBook {
    pub namespaces: Namespaces,
    pub stylesheets: Vec<Stylesheet>,
    pub description: Description,
    pub bodies: Vec<Body>,
    pub binaries: Vec<Binary>,
}

/// A `<stylesheet>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stylesheet {
    /// The `type` attribute, usually `text/css`.
    pub content_type: String,
    pub text: String,
}

impl FictionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top-level sections of every body, in document order.
    ///
    /// Nested sections are not visited.
    pub fn sections(&self) -> impl Iterator<Item = &Section> + Clone {
        self.bodies.iter().flat_map(|body| body.sections.iter())
    }

    /// Title paragraph texts of each top-level section, body by body.
    ///
    /// Sections without a title, or whose title has no paragraphs, yield nothing.
    /// The iterator is lazy; clone it (or call again) to restart.
    pub fn body_section_titles(&self) -> impl Iterator<Item = &str> + Clone {
        self.sections()
            .filter_map(|section| section.title.as_ref())
            .flat_map(|title| title.paragraphs.iter().map(|p| p.text.as_str()))
    }

    /// Look up a binary by its `id`.
    pub fn binary(&self, id: &str) -> Option<&Binary> {
        self.binaries.iter().find(|b| b.id == id)
    }

    /// The binary referenced by the title-info coverpage image, if any.
    pub fn cover_binary(&self) -> Option<&Binary> {
        let image = self.description.title_info.coverpage.image.as_ref()?;
        self.binary(image.binary_id()?)
    }

    /// Report every missing or incorrect root namespace declaration.
    pub fn validate_namespaces(&self) -> Result<(), NamespaceError> {
        self.namespaces.validate()
    }

    /// Replace missing or incorrect namespace declarations with the canonical URIs.
    pub fn normalize_namespaces(&mut self) {
        let repaired = self.namespaces.normalize();
        if !repaired.is_empty() {
            log::debug!("repaired namespace declarations: {repaired:?}");
        }
    }
}

/// Return `doc` with its namespace declarations normalized.
pub fn normalize(mut doc: FictionBook) -> FictionBook {
    doc.normalize_namespaces();
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::XMLNS_FICTIONBOOK;

    fn section(title: &[&str], paragraphs: &[&str]) -> Section {
        Section {
            title: Some(Title {
                paragraphs: title.iter().map(|t| Paragraph::new(*t)).collect(),
            }),
            paragraphs: paragraphs.iter().map(|t| Paragraph::new(*t)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_body_section_titles_main_scenario() {
        let mut book = FictionBook::new();
        book.bodies.push(Body {
            name: Some("Main".to_string()),
            sections: vec![section(&["Chapter 1"], &["Para A", "Para B"])],
            ..Default::default()
        });

        let titles: Vec<&str> = book.body_section_titles().collect();
        assert_eq!(titles, vec!["Chapter 1"]);
    }

    #[test]
    fn test_body_section_titles_skips_untitled_and_nested() {
        let mut nested_parent = section(&["Part I"], &[]);
        nested_parent.sections.push(section(&["Nested"], &["x"]));

        let mut book = FictionBook::new();
        book.bodies.push(Body {
            sections: vec![
                nested_parent,
                Section::default(),
                section(&[], &["untitled paragraphs"]),
            ],
            ..Default::default()
        });
        book.bodies.push(Body {
            name: Some("notes".to_string()),
            sections: vec![section(&["Note 1", "second line"], &[])],
            ..Default::default()
        });

        let titles = book.body_section_titles();
        assert_eq!(
            titles.clone().collect::<Vec<_>>(),
            vec!["Part I", "Note 1", "second line"]
        );
        // Restartable
        assert_eq!(titles.count(), 3);
        assert_eq!(book.sections().count(), 4);
    }

    #[test]
    fn test_cover_binary_resolves_fragment() {
        let mut book = FictionBook::new();
        book.binaries.push(Binary::new("cover.jpg", "image/jpeg", "AAAA"));
        book.description.title_info.coverpage.image = Some(Image::new("#cover.jpg"));
        assert_eq!(book.cover_binary().map(|b| b.id.as_str()), Some("cover.jpg"));

        book.description.title_info.coverpage.image = Some(Image::new("http://example.com/a.jpg"));
        assert!(book.cover_binary().is_none());
    }

    #[test]
    fn test_normalize_fills_missing_namespaces() {
        let doc = normalize(FictionBook::new());
        assert!(doc.validate_namespaces().is_ok());
        assert_eq!(doc.namespaces.fictionbook.as_deref(), Some(XMLNS_FICTIONBOOK));
        assert_eq!(normalize(doc.clone()), doc);
    }
}
