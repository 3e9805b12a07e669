//! # fictionbook
//!
//! A typed reader and writer for FictionBook 2.0 (FB2) ebooks.
//!
//! ## Features
//!
//! - Decode FB2 documents (UTF-8, windows-1251, KOI8-R, ...) and `.fb2.zip` archives
//! - Strict or lenient parsing of malformed real-world files
//! - Encode back to compact or indented XML
//! - Root namespace declarations validated and healed to the canonical set
//!
//! ## Quick Start
//!
//! ```no_run
//! use fictionbook::{read_fb2, write_fb2};
//!
//! let book = read_fb2("input.fb2", false).unwrap();
//! for title in book.body_section_titles() {
//!     println!("{title}");
//! }
//! write_fb2(&book, "output.fb2", true).unwrap();
//! ```
//!
//! ## Building Documents
//!
//! ```
//! use fictionbook::{Author, Body, FictionBook, Paragraph, Section, Title, decode, encode};
//!
//! let mut book = FictionBook::new();
//! let info = &mut book.description.title_info;
//! info.book_title = "My Book".to_string();
//! info.lang = "en".to_string();
//! info.authors.push(Author::new("Jane", "Doe"));
//!
//! book.bodies.push(Body {
//!     sections: vec![Section {
//!         title: Some(Title::new("Chapter 1")),
//!         paragraphs: vec![Paragraph::new("It begins.")],
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! });
//!
//! let bytes = encode(&book, false).unwrap();
//! let decoded = decode(&bytes, true).unwrap();
//! assert_eq!(decoded.body_section_titles().collect::<Vec<_>>(), ["Chapter 1"]);
//! ```

pub mod error;
pub mod fb2;
pub mod model;
pub mod namespace;
pub(crate) mod util;

pub use error::{DecodeError, EncodeError, Error, NamespaceError, NamespaceMismatch, Result};
pub use fb2::{decode, encode, read_fb2, read_fb2_from_reader, write_fb2, write_fb2_to_writer};
pub use model::{
    Annotation, Author, Binary, BlockKind, Body, Cite, Coverpage, CustomInfo, Date, Description,
    DocumentInfo, Epigraph, FictionBook, Image, Paragraph, Poem, PublishInfo, Section, Sequence,
    Stanza, Stylesheet, Subtitle, Title, TitleInfo, Verse, normalize,
};
pub use namespace::Namespaces;
