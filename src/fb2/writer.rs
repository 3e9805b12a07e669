//! FB2 encoding: [`FictionBook`] to UTF-8 XML.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::EncodeError;
use crate::model::{
    Annotation, Author, Binary, BlockKind, Body, Cite, Date, Description, DocumentInfo, Epigraph,
    FictionBook, Image, Paragraph, Poem, PublishInfo, Section, Sequence, Stanza, Subtitle, Title,
    TitleInfo,
};
use crate::namespace::XLINK_PREFIX;
use crate::util::find_invalid_xml_char;

/// Write a [`FictionBook`] to a file on disk.
///
/// # Example
///
/// ```no_run
/// use fictionbook::{FictionBook, write_fb2};
///
/// let mut book = FictionBook::new();
/// book.description.title_info.book_title = "My Book".to_string();
/// book.description.title_info.lang = "en".to_string();
/// write_fb2(&book, "output.fb2", true)?;
/// # Ok::<(), fictionbook::EncodeError>(())
/// ```
pub fn write_fb2<P: AsRef<Path>>(
    doc: &FictionBook,
    path: P,
    pretty: bool,
) -> Result<(), EncodeError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_fb2_to_writer(doc, &mut writer, pretty)?;
    writer.flush()?;
    Ok(())
}

/// Write a [`FictionBook`] to any [`Write`] destination.
///
/// The document itself is not modified: namespace declarations are healed on
/// a copy, so the output always carries the canonical set.
///
/// Text or attribute values holding characters XML cannot represent (NUL,
/// most C0 controls, U+FFFE/U+FFFF) fail with [`EncodeError::InvalidCharacter`].
pub fn write_fb2_to_writer<W: Write>(
    doc: &FictionBook,
    writer: W,
    pretty: bool,
) -> Result<(), EncodeError> {
    let writer = if pretty {
        Writer::new_with_indent(writer, b' ', 2)
    } else {
        Writer::new(writer)
    };
    let mut encoder = Encoder { writer };
    encoder.write_document(doc)?;
    log::debug!(
        "encoded FB2: {} bodies, {} binaries",
        doc.bodies.len(),
        doc.binaries.len()
    );
    Ok(())
}

/// Encode a [`FictionBook`] to bytes.
pub fn encode(doc: &FictionBook, pretty: bool) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    write_fb2_to_writer(doc, &mut out, pretty)?;
    Ok(out)
}

fn check_chars(text: &str) -> Result<(), EncodeError> {
    match find_invalid_xml_char(text) {
        Some(c) => Err(EncodeError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

fn push_attr(element: &mut BytesStart<'_>, key: &str, value: &str) -> Result<(), EncodeError> {
    check_chars(value)?;
    element.push_attribute((key, value));
    Ok(())
}

/// The mixed block lists of a section, annotation, cite or epigraph.
struct Blocks<'d> {
    order: &'d [BlockKind],
    paragraphs: &'d [Paragraph],
    subtitles: &'d [Subtitle],
    poems: &'d [Poem],
    cites: &'d [Cite],
}

struct Encoder<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> Encoder<W> {
    fn start(&mut self, element: BytesStart<'_>) -> Result<(), EncodeError> {
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    fn end(&mut self, name: &str) -> Result<(), EncodeError> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, element: BytesStart<'_>) -> Result<(), EncodeError> {
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    /// `<name attrs>text</name>`, or `<name attrs/>` when `text` is empty.
    fn text_element(&mut self, element: BytesStart<'_>, text: &str) -> Result<(), EncodeError> {
        if text.is_empty() {
            return self.empty(element);
        }
        check_chars(text)?;
        let name = String::from_utf8_lossy(element.name().into_inner()).into_owned();
        self.start(element)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.end(&name)
    }

    fn text(&mut self, name: &str, text: &str) -> Result<(), EncodeError> {
        self.text_element(BytesStart::new(name), text)
    }

    fn optional_text(&mut self, name: &str, text: &str) -> Result<(), EncodeError> {
        if text.is_empty() {
            return Ok(());
        }
        self.text(name, text)
    }

    fn texts(&mut self, name: &str, items: &[String]) -> Result<(), EncodeError> {
        for item in items {
            self.text(name, item)?;
        }
        Ok(())
    }

    fn with_id<'b>(name: &'b str, id: Option<&str>) -> Result<BytesStart<'b>, EncodeError> {
        let mut element = BytesStart::new(name);
        if let Some(id) = id {
            push_attr(&mut element, "id", id)?;
        }
        Ok(element)
    }

    /// Write blocks in recorded document order, then anything the order
    /// does not account for in field order.
    fn write_blocks(&mut self, blocks: Blocks<'_>) -> Result<(), EncodeError> {
        let (mut p, mut s, mut po, mut c) = (0, 0, 0, 0);
        for kind in blocks.order {
            match kind {
                BlockKind::Paragraph if p < blocks.paragraphs.len() => {
                    self.text("p", &blocks.paragraphs[p].text)?;
                    p += 1;
                }
                BlockKind::Subtitle if s < blocks.subtitles.len() => {
                    self.text("subtitle", &blocks.subtitles[s].text)?;
                    s += 1;
                }
                BlockKind::Poem if po < blocks.poems.len() => {
                    self.write_poem(&blocks.poems[po])?;
                    po += 1;
                }
                BlockKind::Cite if c < blocks.cites.len() => {
                    self.write_cite(&blocks.cites[c])?;
                    c += 1;
                }
                _ => {}
            }
        }
        for paragraph in &blocks.paragraphs[p..] {
            self.text("p", &paragraph.text)?;
        }
        for subtitle in &blocks.subtitles[s..] {
            self.text("subtitle", &subtitle.text)?;
        }
        for poem in &blocks.poems[po..] {
            self.write_poem(poem)?;
        }
        for cite in &blocks.cites[c..] {
            self.write_cite(cite)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Document structure
    // ------------------------------------------------------------------------

    fn write_document(&mut self, doc: &FictionBook) -> Result<(), EncodeError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let namespaces = doc.namespaces.clone().normalized();
        let xlink_attr = format!("xmlns:{XLINK_PREFIX}");
        let mut root = BytesStart::new("FictionBook");
        for (key, value) in [
            ("xmlns", &namespaces.fictionbook),
            (xlink_attr.as_str(), &namespaces.xlink),
            ("xmlns:genre", &namespaces.genre),
            ("xmlns:xs", &namespaces.xs),
        ] {
            if let Some(value) = value {
                push_attr(&mut root, key, value)?;
            }
        }
        self.start(root)?;

        for stylesheet in &doc.stylesheets {
            let mut element = BytesStart::new("stylesheet");
            push_attr(&mut element, "type", stylesheet.content_type.as_str())?;
            self.text_element(element, &stylesheet.text)?;
        }
        self.write_description(&doc.description)?;
        for body in &doc.bodies {
            self.write_body(body)?;
        }
        for binary in &doc.binaries {
            self.write_binary(binary)?;
        }

        self.end("FictionBook")
    }

    fn write_binary(&mut self, binary: &Binary) -> Result<(), EncodeError> {
        let mut element = BytesStart::new("binary");
        push_attr(&mut element, "id", binary.id.as_str())?;
        push_attr(&mut element, "content-type", binary.content_type.as_str())?;
        self.text_element(element, &binary.data)
    }

    // ------------------------------------------------------------------------
    // Description
    // ------------------------------------------------------------------------

    fn write_description(&mut self, description: &Description) -> Result<(), EncodeError> {
        self.start(BytesStart::new("description"))?;
        self.write_title_info(&description.title_info)?;
        self.write_document_info(&description.document_info)?;
        if let Some(info) = &description.publish_info {
            self.write_publish_info(info)?;
        }
        for custom in &description.custom_info {
            let mut element = BytesStart::new("custom-info");
            push_attr(&mut element, "info-type", custom.info_type.as_str())?;
            self.text_element(element, &custom.text)?;
        }
        self.end("description")
    }

    fn write_title_info(&mut self, info: &TitleInfo) -> Result<(), EncodeError> {
        self.start(BytesStart::new("title-info"))?;
        self.texts("genre", &info.genres)?;
        for author in &info.authors {
            self.write_author("author", author)?;
        }
        self.text("book-title", &info.book_title)?;
        if let Some(annotation) = &info.annotation {
            self.write_annotation("annotation", annotation)?;
        }
        self.optional_text("keywords", &info.keywords)?;
        self.write_date(&info.date)?;
        if let Some(image) = &info.coverpage.image {
            self.start(BytesStart::new("coverpage"))?;
            self.write_image(image)?;
            self.end("coverpage")?;
        }
        self.text("lang", &info.lang)?;
        self.optional_text("src-lang", &info.src_lang)?;
        for translator in &info.translators {
            self.write_author("translator", translator)?;
        }
        if let Some(sequence) = &info.sequence {
            self.write_sequence(sequence)?;
        }
        self.end("title-info")
    }

    fn write_author(&mut self, name: &str, author: &Author) -> Result<(), EncodeError> {
        self.start(BytesStart::new(name))?;
        self.text("first-name", &author.first_name)?;
        self.optional_text("middle-name", &author.middle_name)?;
        self.text("last-name", &author.last_name)?;
        self.optional_text("nickname", &author.nickname)?;
        self.optional_text("home-page", &author.home_page)?;
        self.optional_text("email", &author.email)?;
        self.end(name)
    }

    fn write_date(&mut self, date: &Date) -> Result<(), EncodeError> {
        let mut element = BytesStart::new("date");
        if let Some(value) = &date.value {
            push_attr(&mut element, "value", value.as_str())?;
        }
        self.text_element(element, &date.text)
    }

    fn write_image(&mut self, image: &Image) -> Result<(), EncodeError> {
        let href_attr = format!("{XLINK_PREFIX}:href");
        let mut element = BytesStart::new("image");
        push_attr(&mut element, href_attr.as_str(), image.href.as_str())?;
        self.empty(element)
    }

    fn write_sequence(&mut self, sequence: &Sequence) -> Result<(), EncodeError> {
        let mut element = BytesStart::new("sequence");
        push_attr(&mut element, "name", sequence.name.as_str())?;
        if let Some(number) = sequence.number {
            element.push_attribute(("number", number.to_string().as_str()));
        }
        self.empty(element)
    }

    fn write_document_info(&mut self, info: &DocumentInfo) -> Result<(), EncodeError> {
        self.start(BytesStart::new("document-info"))?;
        for author in &info.authors {
            self.write_author("author", author)?;
        }
        self.optional_text("program-used", &info.program_used)?;
        self.write_date(&info.date)?;
        self.texts("src-url", &info.src_urls)?;
        self.optional_text("src-ocr", &info.src_ocr)?;
        self.text("id", &info.id)?;
        self.text("version", &info.version.to_string())?;
        if let Some(history) = &info.history {
            self.write_annotation("history", history)?;
        }
        self.end("document-info")
    }

    fn write_publish_info(&mut self, info: &PublishInfo) -> Result<(), EncodeError> {
        self.start(BytesStart::new("publish-info"))?;
        self.optional_text("book-name", &info.book_name)?;
        self.optional_text("publisher", &info.publisher)?;
        self.optional_text("city", &info.city)?;
        if let Some(year) = info.year {
            self.text("year", &year.to_string())?;
        }
        self.optional_text("isbn", &info.isbn)?;
        if let Some(sequence) = &info.sequence {
            self.write_sequence(sequence)?;
        }
        self.end("publish-info")
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    fn write_body(&mut self, body: &Body) -> Result<(), EncodeError> {
        let mut element = BytesStart::new("body");
        if let Some(name) = &body.name {
            push_attr(&mut element, "name", name.as_str())?;
        }
        self.start(element)?;
        if let Some(title) = &body.title {
            self.write_title(title)?;
        }
        if let Some(epigraph) = &body.epigraph {
            self.write_epigraph(epigraph)?;
        }
        for section in &body.sections {
            self.write_section(section)?;
        }
        self.end("body")
    }

    fn write_section(&mut self, section: &Section) -> Result<(), EncodeError> {
        self.start(Self::with_id("section", section.id.as_deref())?)?;
        if let Some(title) = &section.title {
            self.write_title(title)?;
        }
        for epigraph in &section.epigraphs {
            self.write_epigraph(epigraph)?;
        }
        if let Some(annotation) = &section.annotation {
            self.write_annotation("annotation", annotation)?;
        }
        self.write_blocks(Blocks {
            order: &section.order,
            paragraphs: &section.paragraphs,
            subtitles: &section.subtitles,
            poems: &section.poems,
            cites: &section.cites,
        })?;
        for child in &section.sections {
            self.write_section(child)?;
        }
        self.end("section")
    }

    fn write_title(&mut self, title: &Title) -> Result<(), EncodeError> {
        self.start(BytesStart::new("title"))?;
        for paragraph in &title.paragraphs {
            self.text("p", &paragraph.text)?;
        }
        self.end("title")
    }

    fn write_epigraph(&mut self, epigraph: &Epigraph) -> Result<(), EncodeError> {
        self.start(BytesStart::new("epigraph"))?;
        self.write_blocks(Blocks {
            order: &epigraph.order,
            paragraphs: &epigraph.paragraphs,
            subtitles: &[],
            poems: &epigraph.poems,
            cites: &epigraph.cites,
        })?;
        self.texts("text-author", &epigraph.text_authors)?;
        self.end("epigraph")
    }

    fn write_poem(&mut self, poem: &Poem) -> Result<(), EncodeError> {
        self.start(BytesStart::new("poem"))?;
        if let Some(title) = &poem.title {
            self.write_title(title)?;
        }
        for epigraph in &poem.epigraphs {
            self.write_epigraph(epigraph)?;
        }
        for stanza in &poem.stanzas {
            self.write_stanza(stanza)?;
        }
        self.texts("text-author", &poem.text_authors)?;
        if let Some(date) = &poem.date {
            self.write_date(date)?;
        }
        self.end("poem")
    }

    fn write_stanza(&mut self, stanza: &Stanza) -> Result<(), EncodeError> {
        self.start(BytesStart::new("stanza"))?;
        if let Some(title) = &stanza.title {
            self.write_title(title)?;
        }
        if let Some(subtitle) = &stanza.subtitle {
            self.text("subtitle", &subtitle.text)?;
        }
        for verse in &stanza.verses {
            self.text("v", &verse.text)?;
        }
        self.end("stanza")
    }

    fn write_cite(&mut self, cite: &Cite) -> Result<(), EncodeError> {
        self.start(Self::with_id("cite", cite.id.as_deref())?)?;
        self.write_blocks(Blocks {
            order: &cite.order,
            paragraphs: &cite.paragraphs,
            subtitles: &cite.subtitles,
            poems: &cite.poems,
            cites: &[],
        })?;
        self.texts("text-author", &cite.text_authors)?;
        self.end("cite")
    }

    fn write_annotation(&mut self, name: &str, annotation: &Annotation) -> Result<(), EncodeError> {
        self.start(Self::with_id(name, annotation.id.as_deref())?)?;
        self.write_blocks(Blocks {
            order: &annotation.order,
            paragraphs: &annotation.paragraphs,
            subtitles: &annotation.subtitles,
            poems: &annotation.poems,
            cites: &annotation.cites,
        })?;
        self.end(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coverpage, CustomInfo};
    use crate::namespace::{Namespaces, XMLNS_FICTIONBOOK, XMLNS_GENRE, XMLNS_XLINK, XMLNS_XS};

    fn sample() -> FictionBook {
        let mut book = FictionBook::new();
        let info = &mut book.description.title_info;
        info.book_title = "Tom & Jerry".to_string();
        info.lang = "en".to_string();
        info.authors.push(Author::new("Jane", "Doe"));
        book.bodies.push(Body {
            sections: vec![Section {
                paragraphs: vec![Paragraph::new("1 < 2")],
                ..Default::default()
            }],
            ..Default::default()
        });
        book
    }

    fn encode_str(book: &FictionBook, pretty: bool) -> String {
        String::from_utf8(encode(book, pretty).unwrap()).unwrap()
    }

    #[test]
    fn test_declaration_and_namespaces() {
        let xml = encode_str(&sample(), false);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(&format!(r#"xmlns="{XMLNS_FICTIONBOOK}""#)));
        assert!(xml.contains(&format!(r#"xmlns:l="{XMLNS_XLINK}""#)));
        assert!(xml.contains(&format!(r#"xmlns:genre="{XMLNS_GENRE}""#)));
        assert!(xml.contains(&format!(r#"xmlns:xs="{XMLNS_XS}""#)));
    }

    #[test]
    fn test_encode_does_not_mutate_document() {
        let book = sample();
        assert_eq!(book.namespaces, Namespaces::default());
        encode(&book, false).unwrap();
        assert_eq!(book.namespaces, Namespaces::default());
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = encode_str(&sample(), false);
        assert!(xml.contains("<book-title>Tom &amp; Jerry</book-title>"));
        assert!(xml.contains("<p>1 &lt; 2</p>"));
    }

    #[test]
    fn test_optional_elements_omitted() {
        let xml = encode_str(&sample(), false);
        assert!(!xml.contains("<coverpage"));
        assert!(!xml.contains("<image"));
        assert!(!xml.contains("custom-info"));
        assert!(!xml.contains("publish-info"));
        assert!(!xml.contains("middle-name"));
        assert!(!xml.contains("keywords"));
        // required even when empty
        assert!(xml.contains("<date/>"));
        assert!(xml.contains("<id/>"));
        assert!(xml.contains("<version>0</version>"));
    }

    #[test]
    fn test_coverpage_and_custom_info_written() {
        let mut book = sample();
        book.description.title_info.coverpage = Coverpage {
            image: Some(Image::new("#cover.jpg")),
        };
        book.description.custom_info.push(CustomInfo {
            info_type: "general".to_string(),
            text: "note".to_string(),
        });
        let xml = encode_str(&book, false);
        assert!(xml.contains(r##"<coverpage><image l:href="#cover.jpg"/></coverpage>"##));
        assert!(xml.contains(r#"<custom-info info-type="general">note</custom-info>"#));
    }

    #[test]
    fn test_pretty_output_is_indented() {
        let xml = encode_str(&sample(), true);
        assert!(xml.contains("\n  <description>"));
        assert!(xml.contains("\n    <title-info>"));
        assert!(!encode_str(&sample(), false).contains("\n  <description>"));
    }

    #[test]
    fn test_non_xml_characters_are_rejected() {
        let mut book = sample();
        book.bodies[0].sections[0].paragraphs[0] = Paragraph::new("x\u{0}y\u{b}z");
        assert!(matches!(
            encode(&book, false),
            Err(EncodeError::InvalidCharacter('\u{0}'))
        ));

        let mut book = sample();
        book.bodies[0].name = Some("bad\u{FFFE}".to_string());
        assert!(matches!(
            encode(&book, true),
            Err(EncodeError::InvalidCharacter('\u{FFFE}'))
        ));

        let mut book = sample();
        book.bodies[0].sections[0].paragraphs[0] = Paragraph::new("tab\tand\nnewline");
        assert!(encode(&book, false).is_ok());
    }

    #[test]
    fn test_block_order_is_replayed() {
        let mut book = sample();
        book.bodies[0].sections[0] = Section {
            paragraphs: vec![Paragraph::new("one"), Paragraph::new("two")],
            subtitles: vec![Subtitle {
                text: "S".to_string(),
            }],
            order: vec![BlockKind::Paragraph, BlockKind::Subtitle, BlockKind::Paragraph],
            ..Default::default()
        };
        let xml = encode_str(&book, false);
        assert!(xml.contains("<section><p>one</p><subtitle>S</subtitle><p>two</p></section>"));
    }

    #[test]
    fn test_blocks_missing_from_order_are_appended() {
        let mut book = sample();
        book.bodies[0].sections[0] = Section {
            paragraphs: vec![Paragraph::new("one"), Paragraph::new("added")],
            subtitles: vec![Subtitle {
                text: "S".to_string(),
            }],
            // stale order: a paragraph was pushed after decoding
            order: vec![BlockKind::Subtitle, BlockKind::Paragraph, BlockKind::Cite],
            ..Default::default()
        };
        let xml = encode_str(&book, false);
        assert!(xml.contains("<section><subtitle>S</subtitle><p>one</p><p>added</p></section>"));
    }
}
