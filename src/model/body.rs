//! Book content: bodies, recursive sections and the blocks they hold.

/// A `<body>`. Books usually have one main body and optionally a `notes` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Body {
    pub name: Option<String>,
    pub title: Option<Title>,
    pub epigraph: Option<Epigraph>,
    pub sections: Vec<Section>,
}

/// Kind of a block inside a mixed-content container.
///
/// Containers keep one list per block kind plus an `order` of kinds as they
/// appeared in the document. The encoder replays `order`, taking the next
/// unwritten item of each kind, then appends whatever `order` did not cover.
/// An empty `order` writes the lists in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    Paragraph,
    Subtitle,
    Poem,
    Cite,
}

/// A `<section>`; sections nest to arbitrary depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Section {
    pub id: Option<String>,
    pub title: Option<Title>,
    pub epigraphs: Vec<Epigraph>,
    pub annotation: Option<Annotation>,
    pub paragraphs: Vec<Paragraph>,
    pub subtitles: Vec<Subtitle>,
    pub poems: Vec<Poem>,
    pub cites: Vec<Cite>,
    /// Document order of `paragraphs`, `subtitles`, `poems` and `cites`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub order: Vec<BlockKind>,
    pub sections: Vec<Section>,
}

impl Section {
    /// Depth of the deepest nested section below this one (0 for a leaf).
    pub fn depth(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Title {
    pub paragraphs: Vec<Paragraph>,
}

impl Title {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            paragraphs: vec![Paragraph::new(text)],
        }
    }
}

/// A `<p>`. Inline markup is flattened to its character data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Paragraph {
    pub text: String,
}

impl Paragraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subtitle {
    pub text: String,
}

/// A poem line (`<v>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Verse {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Epigraph {
    pub paragraphs: Vec<Paragraph>,
    pub poems: Vec<Poem>,
    pub cites: Vec<Cite>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub order: Vec<BlockKind>,
    pub text_authors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Poem {
    pub title: Option<Title>,
    pub epigraphs: Vec<Epigraph>,
    pub stanzas: Vec<Stanza>,
    pub text_authors: Vec<String>,
    pub date: Option<super::Date>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stanza {
    pub title: Option<Title>,
    pub subtitle: Option<Subtitle>,
    pub verses: Vec<Verse>,
}

/// A quotation block (`<cite>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cite {
    pub id: Option<String>,
    pub paragraphs: Vec<Paragraph>,
    pub subtitles: Vec<Subtitle>,
    pub poems: Vec<Poem>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub order: Vec<BlockKind>,
    pub text_authors: Vec<String>,
}

/// An `<annotation>`, also used for `<history>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Annotation {
    pub id: Option<String>,
    pub paragraphs: Vec<Paragraph>,
    pub subtitles: Vec<Subtitle>,
    pub poems: Vec<Poem>,
    pub cites: Vec<Cite>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub order: Vec<BlockKind>,
}
