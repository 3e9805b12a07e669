//! FB2 decoding: bytes to [`FictionBook`].

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::encoding::Decoder as TextDecoder;
use quick_xml::events::{BytesStart, Event};

use crate::error::DecodeError;
use crate::model::{
    Annotation, Author, Binary, Body, Cite, Coverpage, CustomInfo, Date, Description,
    DocumentInfo, Epigraph, FictionBook, Image, Paragraph, Poem, PublishInfo, Section, Sequence,
    Stanza, Stylesheet, Subtitle, Title, TitleInfo, Verse,
};
use crate::namespace::Namespaces;
use crate::model::BlockKind;
use crate::util::{
    decode_text, decode_text_lossy, extract_xml_encoding, find_invalid_xml_char, local_name,
    resolve_entity, strip_invalid_xml_chars,
};

use super::cover::scan_coverpage_href;

/// Deepest element nesting accepted before decoding is aborted.
///
/// Structural elements are decoded recursively; this bound keeps the descent
/// within a 2 MiB thread stack.
pub const MAX_DEPTH: usize = 128;

/// Upper bound on the buffer reserved from a ZIP entry's declared size.
const MAX_PREALLOC: usize = 64 << 20;

/// Read an FB2 file from disk.
///
/// Paths ending in `.zip` are opened as archives and the first `.fb2` entry is
/// decoded.
///
/// # Example
///
/// ```no_run
/// use fictionbook::read_fb2;
///
/// let book = read_fb2("book.fb2", true)?;
/// println!("{}", book.description.title_info.book_title);
/// # Ok::<(), fictionbook::DecodeError>(())
/// ```
pub fn read_fb2<P: AsRef<Path>>(path: P, strict: bool) -> Result<FictionBook, DecodeError> {
    let data = read_fb2_bytes(path)?;
    decode(&data, strict)
}

/// Load the raw document bytes from disk, unpacking `.zip` archives.
pub fn read_fb2_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, DecodeError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
    {
        return read_zip_entry(file);
    }
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Read an FB2 document from any [`Read`] source.
pub fn read_fb2_from_reader<R: Read>(
    mut reader: R,
    strict: bool,
) -> Result<FictionBook, DecodeError> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decode(&data, strict)
}

/// Decode the first `.fb2` entry of a ZIP archive.
pub fn read_fb2_from_zip<R: Read + Seek>(
    reader: R,
    strict: bool,
) -> Result<FictionBook, DecodeError> {
    let data = read_zip_entry(reader)?;
    decode(&data, strict)
}

/// Buffer size to reserve for an archive entry. The declared size comes from
/// the archive header and is not trusted.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).unwrap_or(usize::MAX).min(MAX_PREALLOC)
}

fn read_zip_entry<R: Read + Seek>(reader: R) -> Result<Vec<u8>, DecodeError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let is_fb2 = Path::new(entry.name())
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("fb2"));
        if is_fb2 {
            log::debug!("reading archive entry {}", entry.name());
            let mut data = Vec::with_capacity(initial_capacity(entry.size()));
            entry.read_to_end(&mut data)?;
            return Ok(data);
        }
    }
    Err(DecodeError::MissingArchiveEntry)
}

/// Decode an FB2 document held in memory.
///
/// With `strict` set, any well-formedness problem fails the call. Otherwise
/// unescaped `&`, unknown entities, mismatched end tags and truncated input are
/// recovered from on a best-effort basis.
///
/// The returned document always carries the canonical namespace declarations.
pub fn decode(input: &[u8], strict: bool) -> Result<FictionBook, DecodeError> {
    let hint = extract_xml_encoding(input);
    let text = match decode_text(input, hint) {
        Some(text) => text,
        None if strict => return Err(DecodeError::Encoding),
        None => {
            log::warn!(
                "input is not valid UTF-8 and declares no encoding, assuming windows-1251"
            );
            decode_text_lossy(input, None)
        }
    };

    let mut book = BookDecoder::new(&text, strict).parse_document()?;

    if let Some(href) = scan_coverpage_href(&text) {
        let coverpage = &mut book.description.title_info.coverpage;
        match coverpage.image.as_mut() {
            Some(image) if image.href != href => {
                log::debug!("coverpage href overridden: {:?} -> {:?}", image.href, href);
                image.href = href;
            }
            Some(_) => {}
            None => {
                log::debug!("coverpage href recovered by scan: {href:?}");
                coverpage.image = Some(Image::new(href));
            }
        }
    }

    book.normalize_namespaces();
    log::debug!(
        "decoded FB2: {} bodies, {} binaries",
        book.bodies.len(),
        book.binaries.len()
    );
    Ok(book)
}

/// The root namespace declarations exactly as written, without healing.
///
/// Only the document prolog and root start tag are read.
pub fn root_namespaces(input: &[u8], strict: bool) -> Result<Namespaces, DecodeError> {
    let hint = extract_xml_encoding(input);
    let text = match decode_text(input, hint) {
        Some(text) => text,
        None if strict => return Err(DecodeError::Encoding),
        None => decode_text_lossy(input, None),
    };
    let mut decoder = BookDecoder::new(&text, strict);
    let root = decoder.root()?;
    decoder.parse_namespaces(&root)
}

/// Collect an element's attributes as `(qualified name, value)` pairs.
///
/// In lenient mode malformed attributes are skipped and values that fail to
/// unescape are kept raw.
pub(crate) fn attributes(
    start: &BytesStart<'_>,
    decoder: TextDecoder,
    strict: bool,
) -> Result<Vec<(String, String)>, DecodeError> {
    let mut out = Vec::new();
    for attr in start.attributes().with_checks(strict) {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) if strict => return Err(e.into()),
            Err(e) => {
                log::warn!("skipping malformed attribute: {e}");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.decode_and_unescape_value(decoder) {
            Ok(value) => value.into_owned(),
            Err(source) if strict => return Err(DecodeError::Xml { position: 0, source }),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        let value = match find_invalid_xml_char(&value) {
            None => value,
            Some(c) if strict => return Err(DecodeError::InvalidCharacter(c)),
            Some(c) => {
                log::warn!(
                    "dropping invalid character U+{:04X} from attribute {key}",
                    u32::from(c)
                );
                strip_invalid_xml_chars(&value).into_owned()
            }
        };
        out.push((key, value));
    }
    Ok(out)
}

/// An element whose start tag has been consumed.
struct Element<'a> {
    start: BytesStart<'a>,
    /// Self-closing (`<x/>`): there is no content and no end tag to consume.
    empty: bool,
}

impl Element<'_> {
    fn name(&self) -> &[u8] {
        local_name(self.start.name().into_inner())
    }

    fn display_name(&self) -> String {
        String::from_utf8_lossy(self.name()).into_owned()
    }
}

/// Recursive-descent decoder over the quick-xml event stream.
///
/// Every `parse_*` method consumes the element it is given, up to and
/// including its end tag.
struct BookDecoder<'a> {
    reader: Reader<&'a [u8]>,
    strict: bool,
    depth: usize,
    truncated: bool,
}

impl<'a> BookDecoder<'a> {
    fn new(text: &'a str, strict: bool) -> Self {
        let mut reader = Reader::from_str(text);
        let config = reader.config_mut();
        config.check_end_names = strict;
        config.check_comments = strict;
        config.allow_unmatched_ends = !strict;
        config.allow_dangling_amp = !strict;

        Self {
            reader,
            strict,
            depth: 0,
            truncated: false,
        }
    }

    // ------------------------------------------------------------------------
    // Event plumbing
    // ------------------------------------------------------------------------

    fn xml_error(&self, source: quick_xml::Error) -> DecodeError {
        DecodeError::Xml {
            position: self.reader.buffer_position() as u64,
            source,
        }
    }

    fn next_event(&mut self) -> Result<Event<'a>, DecodeError> {
        self.reader.read_event().map_err(|source| DecodeError::Xml {
            position: self.reader.error_position() as u64,
            source,
        })
    }

    fn enter(&mut self) -> Result<(), DecodeError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn open(&mut self, start: BytesStart<'a>, empty: bool) -> Result<Element<'a>, DecodeError> {
        if !empty {
            self.enter()?;
        }
        Ok(Element { start, empty })
    }

    /// End of input inside `element`: an error in strict mode, an implicit
    /// close otherwise.
    fn unexpected_eof(&mut self, element: &Element<'a>) -> Result<(), DecodeError> {
        if self.strict {
            return Err(DecodeError::UnexpectedEof(element.display_name()));
        }
        if !self.truncated {
            log::warn!(
                "input ended inside <{}>, closing open elements",
                element.display_name()
            );
            self.truncated = true;
        }
        self.leave();
        Ok(())
    }

    /// Next child element of `parent`, or `None` once its end tag is consumed.
    ///
    /// Character data between child elements is ignored.
    fn next_child(
        &mut self,
        parent: &Element<'a>,
    ) -> Result<Option<Element<'a>>, DecodeError> {
        if parent.empty {
            return Ok(None);
        }
        loop {
            match self.next_event()? {
                Event::Start(start) => return self.open(start, false).map(Some),
                Event::Empty(start) => return self.open(start, true).map(Some),
                Event::End(_) => {
                    self.leave();
                    return Ok(None);
                }
                Event::Eof => {
                    self.unexpected_eof(parent)?;
                    return Ok(None);
                }
                Event::GeneralRef(e) if self.strict => {
                    self.resolve_ref(&String::from_utf8_lossy(&e))?;
                }
                _ => {}
            }
        }
    }

    /// All character data below `element`, inline markup flattened.
    fn read_text(&mut self, element: &Element<'a>) -> Result<String, DecodeError> {
        let mut text = String::new();
        if element.empty {
            return Ok(text);
        }
        let mut nested = 0usize;
        loop {
            match self.next_event()? {
                Event::Text(e) => {
                    let chunk = e.xml_content().map_err(|e| self.xml_error(e.into()))?;
                    self.push_text(&mut text, &chunk)?;
                }
                Event::CData(e) => {
                    let chunk = e.xml_content().map_err(|e| self.xml_error(e.into()))?;
                    self.push_text(&mut text, &chunk)?;
                }
                Event::GeneralRef(e) => {
                    let resolved = self.resolve_ref(&String::from_utf8_lossy(&e))?;
                    text.push_str(&resolved);
                }
                Event::Start(_) => {
                    nested += 1;
                    self.enter()?;
                }
                Event::End(_) if nested > 0 => {
                    nested -= 1;
                    self.leave();
                }
                Event::End(_) => {
                    self.leave();
                    return Ok(text);
                }
                Event::Eof => {
                    self.unexpected_eof(element)?;
                    return Ok(text);
                }
                _ => {}
            }
        }
    }

    /// Consume `element` without interpreting it.
    fn skip(&mut self, element: &Element<'a>) -> Result<(), DecodeError> {
        if element.empty {
            return Ok(());
        }
        let mut nested = 0usize;
        loop {
            match self.next_event()? {
                Event::Start(_) => nested += 1,
                Event::End(_) if nested > 0 => nested -= 1,
                Event::End(_) => {
                    self.leave();
                    return Ok(());
                }
                Event::Eof => return self.unexpected_eof(element),
                Event::GeneralRef(e) if self.strict => {
                    self.resolve_ref(&String::from_utf8_lossy(&e))?;
                }
                _ => {}
            }
        }
    }

    /// Append character data, rejecting (strict) or dropping (lenient)
    /// characters XML does not allow.
    fn push_text(&self, text: &mut String, chunk: &str) -> Result<(), DecodeError> {
        match find_invalid_xml_char(chunk) {
            None => text.push_str(chunk),
            Some(c) if self.strict => return Err(DecodeError::InvalidCharacter(c)),
            Some(c) => {
                log::warn!("dropping invalid character U+{:04X}", u32::from(c));
                text.push_str(&strip_invalid_xml_chars(chunk));
            }
        }
        Ok(())
    }

    fn resolve_ref(&self, name: &str) -> Result<String, DecodeError> {
        match resolve_entity(name) {
            Some(resolved) => Ok(resolved),
            None if self.strict && name.starts_with('#') => {
                Err(DecodeError::InvalidCharacterReference(name.to_string()))
            }
            None if self.strict => Err(DecodeError::UnknownEntity(name.to_string())),
            None => {
                log::warn!("keeping unresolvable reference &{name}; literally");
                Ok(format!("&{name};"))
            }
        }
    }

    fn attributes(&self, element: &Element<'a>) -> Result<Vec<(String, String)>, DecodeError> {
        attributes(&element.start, self.reader.decoder(), self.strict).map_err(|e| match e {
            DecodeError::Xml { source, .. } => DecodeError::Xml {
                position: self.reader.buffer_position() as u64,
                source,
            },
            other => other,
        })
    }

    /// Value of the attribute whose local name is `name`.
    fn attr(&self, element: &Element<'a>, name: &str) -> Result<Option<String>, DecodeError> {
        Ok(self
            .attributes(element)?
            .into_iter()
            .find(|(key, _)| local_name(key.as_bytes()) == name.as_bytes())
            .map(|(_, value)| value))
    }

    fn parse_number<T: FromStr>(
        &self,
        field: &'static str,
        value: &str,
    ) -> Result<Option<T>, DecodeError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        match value.parse() {
            Ok(number) => Ok(Some(number)),
            Err(_) if self.strict => Err(DecodeError::InvalidValue {
                field,
                value: value.to_string(),
            }),
            Err(_) => {
                log::warn!("ignoring invalid {field} value {value:?}");
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Document structure
    // ------------------------------------------------------------------------

    fn root(&mut self) -> Result<Element<'a>, DecodeError> {
        loop {
            let root = match self.next_event()? {
                Event::Start(start) => self.open(start, false)?,
                Event::Empty(start) => self.open(start, true)?,
                Event::Eof => return Err(DecodeError::MissingRoot),
                _ => continue,
            };
            if root.name() != b"FictionBook" {
                return Err(DecodeError::UnexpectedRoot(root.display_name()));
            }
            return Ok(root);
        }
    }

    fn parse_document(mut self) -> Result<FictionBook, DecodeError> {
        let root = self.root()?;
        self.parse_root(&root)
    }

    fn parse_root(&mut self, root: &Element<'a>) -> Result<FictionBook, DecodeError> {
        let mut book = FictionBook::new();
        book.namespaces = self.parse_namespaces(root)?;

        while let Some(child) = self.next_child(root)? {
            match child.name() {
                b"stylesheet" => book.stylesheets.push(Stylesheet {
                    content_type: self.attr(&child, "type")?.unwrap_or_default(),
                    text: self.read_text(&child)?,
                }),
                b"description" => book.description = self.parse_description(&child)?,
                b"body" => book.bodies.push(self.parse_body(&child)?),
                b"binary" => book.binaries.push(Binary {
                    id: self.attr(&child, "id")?.unwrap_or_default(),
                    content_type: self.attr(&child, "content-type")?.unwrap_or_default(),
                    data: self.read_text(&child)?,
                }),
                _ => self.skip(&child)?,
            }
        }
        Ok(book)
    }

    fn parse_namespaces(&self, root: &Element<'a>) -> Result<Namespaces, DecodeError> {
        let mut namespaces = Namespaces::default();
        for (key, value) in self.attributes(root)? {
            match key.as_str() {
                "xmlns" => namespaces.fictionbook = Some(value),
                "xmlns:l" => namespaces.xlink = Some(value),
                "xmlns:xlink" if namespaces.xlink.is_none() => namespaces.xlink = Some(value),
                "xmlns:genre" => namespaces.genre = Some(value),
                "xmlns:xs" => namespaces.xs = Some(value),
                _ => {}
            }
        }
        Ok(namespaces)
    }

    // ------------------------------------------------------------------------
    // Description
    // ------------------------------------------------------------------------

    fn parse_description(&mut self, element: &Element<'a>) -> Result<Description, DecodeError> {
        let mut description = Description::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"title-info" => description.title_info = self.parse_title_info(&child)?,
                b"document-info" => {
                    description.document_info = self.parse_document_info(&child)?
                }
                b"publish-info" => {
                    description.publish_info = Some(self.parse_publish_info(&child)?)
                }
                b"custom-info" => description.custom_info.push(CustomInfo {
                    info_type: self.attr(&child, "info-type")?.unwrap_or_default(),
                    text: self.read_text(&child)?,
                }),
                _ => self.skip(&child)?,
            }
        }
        Ok(description)
    }

    fn parse_title_info(&mut self, element: &Element<'a>) -> Result<TitleInfo, DecodeError> {
        let mut info = TitleInfo::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"genre" => info.genres.push(self.read_text(&child)?),
                b"author" => info.authors.push(self.parse_author(&child)?),
                b"book-title" => info.book_title = self.read_text(&child)?,
                b"annotation" => info.annotation = Some(self.parse_annotation(&child)?),
                b"keywords" => info.keywords = self.read_text(&child)?,
                b"date" => info.date = self.parse_date(&child)?,
                b"coverpage" => info.coverpage = self.parse_coverpage(&child)?,
                b"lang" => info.lang = self.read_text(&child)?,
                b"src-lang" => info.src_lang = self.read_text(&child)?,
                b"translator" => info.translators.push(self.parse_author(&child)?),
                b"sequence" => info.sequence = Some(self.parse_sequence(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(info)
    }

    fn parse_author(&mut self, element: &Element<'a>) -> Result<Author, DecodeError> {
        let mut author = Author::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"first-name" => author.first_name = self.read_text(&child)?,
                b"middle-name" => author.middle_name = self.read_text(&child)?,
                b"last-name" => author.last_name = self.read_text(&child)?,
                b"nickname" => author.nickname = self.read_text(&child)?,
                b"home-page" => author.home_page = self.read_text(&child)?,
                b"email" => author.email = self.read_text(&child)?,
                _ => self.skip(&child)?,
            }
        }
        Ok(author)
    }

    fn parse_date(&mut self, element: &Element<'a>) -> Result<Date, DecodeError> {
        Ok(Date {
            value: self.attr(element, "value")?,
            text: self.read_text(element)?,
        })
    }

    fn parse_coverpage(&mut self, element: &Element<'a>) -> Result<Coverpage, DecodeError> {
        let mut coverpage = Coverpage::default();
        while let Some(child) = self.next_child(element)? {
            if child.name() == b"image" && coverpage.image.is_none() {
                let href = self.attr(&child, "href")?.unwrap_or_default();
                coverpage.image = Some(Image { href });
            }
            self.skip(&child)?;
        }
        Ok(coverpage)
    }

    fn parse_sequence(&mut self, element: &Element<'a>) -> Result<Sequence, DecodeError> {
        let name = self.attr(element, "name")?.unwrap_or_default();
        let number = match self.attr(element, "number")? {
            Some(value) => self.parse_number("sequence number", &value)?,
            None => None,
        };
        // Nested sub-series are not modelled
        self.skip(element)?;
        Ok(Sequence { name, number })
    }

    fn parse_document_info(&mut self, element: &Element<'a>) -> Result<DocumentInfo, DecodeError> {
        let mut info = DocumentInfo::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"author" => info.authors.push(self.parse_author(&child)?),
                b"program-used" => info.program_used = self.read_text(&child)?,
                b"date" => info.date = self.parse_date(&child)?,
                b"src-url" => info.src_urls.push(self.read_text(&child)?),
                b"src-ocr" => info.src_ocr = self.read_text(&child)?,
                b"id" => info.id = self.read_text(&child)?,
                b"version" => {
                    let text = self.read_text(&child)?;
                    info.version = self.parse_number("version", &text)?.unwrap_or_default();
                }
                b"history" => info.history = Some(self.parse_annotation(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(info)
    }

    fn parse_publish_info(&mut self, element: &Element<'a>) -> Result<PublishInfo, DecodeError> {
        let mut info = PublishInfo::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"book-name" => info.book_name = self.read_text(&child)?,
                b"publisher" => info.publisher = self.read_text(&child)?,
                b"city" => info.city = self.read_text(&child)?,
                b"year" => {
                    let text = self.read_text(&child)?;
                    info.year = self.parse_number("year", &text)?;
                }
                b"isbn" => info.isbn = self.read_text(&child)?,
                b"sequence" => info.sequence = Some(self.parse_sequence(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(info)
    }

    // ------------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------------

    fn parse_body(&mut self, element: &Element<'a>) -> Result<Body, DecodeError> {
        let mut body = Body {
            name: self.attr(element, "name")?,
            ..Default::default()
        };
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"title" => body.title = Some(self.parse_title(&child)?),
                b"epigraph" => body.epigraph = Some(self.parse_epigraph(&child)?),
                b"section" => body.sections.push(self.parse_section(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(body)
    }

    fn parse_section(&mut self, element: &Element<'a>) -> Result<Section, DecodeError> {
        let mut section = Section {
            id: self.attr(element, "id")?,
            ..Default::default()
        };
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"title" => section.title = Some(self.parse_title(&child)?),
                b"epigraph" => section.epigraphs.push(self.parse_epigraph(&child)?),
                b"annotation" => section.annotation = Some(self.parse_annotation(&child)?),
                b"p" => {
                    section.paragraphs.push(Paragraph::new(self.read_text(&child)?));
                    section.order.push(BlockKind::Paragraph);
                }
                b"subtitle" => {
                    section.subtitles.push(Subtitle {
                        text: self.read_text(&child)?,
                    });
                    section.order.push(BlockKind::Subtitle);
                }
                b"poem" => {
                    section.poems.push(self.parse_poem(&child)?);
                    section.order.push(BlockKind::Poem);
                }
                b"cite" => {
                    section.cites.push(self.parse_cite(&child)?);
                    section.order.push(BlockKind::Cite);
                }
                b"section" => section.sections.push(self.parse_section(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(section)
    }

    fn parse_title(&mut self, element: &Element<'a>) -> Result<Title, DecodeError> {
        let mut title = Title::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"p" => title.paragraphs.push(Paragraph::new(self.read_text(&child)?)),
                _ => self.skip(&child)?,
            }
        }
        Ok(title)
    }

    fn parse_epigraph(&mut self, element: &Element<'a>) -> Result<Epigraph, DecodeError> {
        let mut epigraph = Epigraph::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"p" => {
                    epigraph.paragraphs.push(Paragraph::new(self.read_text(&child)?));
                    epigraph.order.push(BlockKind::Paragraph);
                }
                b"poem" => {
                    epigraph.poems.push(self.parse_poem(&child)?);
                    epigraph.order.push(BlockKind::Poem);
                }
                b"cite" => {
                    epigraph.cites.push(self.parse_cite(&child)?);
                    epigraph.order.push(BlockKind::Cite);
                }
                b"text-author" => epigraph.text_authors.push(self.read_text(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(epigraph)
    }

    fn parse_poem(&mut self, element: &Element<'a>) -> Result<Poem, DecodeError> {
        let mut poem = Poem::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"title" => poem.title = Some(self.parse_title(&child)?),
                b"epigraph" => poem.epigraphs.push(self.parse_epigraph(&child)?),
                b"stanza" => poem.stanzas.push(self.parse_stanza(&child)?),
                b"text-author" => poem.text_authors.push(self.read_text(&child)?),
                b"date" => poem.date = Some(self.parse_date(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(poem)
    }

    fn parse_stanza(&mut self, element: &Element<'a>) -> Result<Stanza, DecodeError> {
        let mut stanza = Stanza::default();
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"title" => stanza.title = Some(self.parse_title(&child)?),
                b"subtitle" => {
                    stanza.subtitle = Some(Subtitle {
                        text: self.read_text(&child)?,
                    })
                }
                b"v" => stanza.verses.push(Verse {
                    text: self.read_text(&child)?,
                }),
                _ => self.skip(&child)?,
            }
        }
        Ok(stanza)
    }

    fn parse_cite(&mut self, element: &Element<'a>) -> Result<Cite, DecodeError> {
        let mut cite = Cite {
            id: self.attr(element, "id")?,
            ..Default::default()
        };
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"p" => {
                    cite.paragraphs.push(Paragraph::new(self.read_text(&child)?));
                    cite.order.push(BlockKind::Paragraph);
                }
                b"subtitle" => {
                    cite.subtitles.push(Subtitle {
                        text: self.read_text(&child)?,
                    });
                    cite.order.push(BlockKind::Subtitle);
                }
                b"poem" => {
                    cite.poems.push(self.parse_poem(&child)?);
                    cite.order.push(BlockKind::Poem);
                }
                b"text-author" => cite.text_authors.push(self.read_text(&child)?),
                _ => self.skip(&child)?,
            }
        }
        Ok(cite)
    }

    fn parse_annotation(&mut self, element: &Element<'a>) -> Result<Annotation, DecodeError> {
        let mut annotation = Annotation {
            id: self.attr(element, "id")?,
            ..Default::default()
        };
        while let Some(child) = self.next_child(element)? {
            match child.name() {
                b"p" => {
                    annotation.paragraphs.push(Paragraph::new(self.read_text(&child)?));
                    annotation.order.push(BlockKind::Paragraph);
                }
                b"subtitle" => {
                    annotation.subtitles.push(Subtitle {
                        text: self.read_text(&child)?,
                    });
                    annotation.order.push(BlockKind::Subtitle);
                }
                b"poem" => {
                    annotation.poems.push(self.parse_poem(&child)?);
                    annotation.order.push(BlockKind::Poem);
                }
                b"cite" => {
                    annotation.cites.push(self.parse_cite(&child)?);
                    annotation.order.push(BlockKind::Cite);
                }
                _ => self.skip(&child)?,
            }
        }
        Ok(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{XMLNS_FICTIONBOOK, XMLNS_XLINK};

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0" xmlns:l="http://www.w3.org/1999/xlink">
<description><title-info><book-title>T</book-title><lang>en</lang></title-info></description>
{body}
</FictionBook>"#
        )
    }

    #[test]
    fn test_decode_minimal() {
        let book = decode(wrap("<body><section><p>Hi</p></section></body>").as_bytes(), true)
            .unwrap();
        assert_eq!(book.description.title_info.book_title, "T");
        assert_eq!(book.description.title_info.lang, "en");
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "Hi");
        assert_eq!(book.namespaces.fictionbook.as_deref(), Some(XMLNS_FICTIONBOOK));
        assert_eq!(book.namespaces.xlink.as_deref(), Some(XMLNS_XLINK));
        assert!(book.validate_namespaces().is_ok());
    }

    #[test]
    fn test_inline_markup_is_flattened() {
        let xml = wrap(
            "<body><section><p>A <emphasis>bold <strong>move</strong></emphasis> \
             &amp; more&#33;</p></section></body>",
        );
        let book = decode(xml.as_bytes(), true).unwrap();
        assert_eq!(
            book.bodies[0].sections[0].paragraphs[0].text,
            "A bold move & more!"
        );
    }

    #[test]
    fn test_prefixed_elements_and_unknown_elements() {
        let xml = r#"<fb:FictionBook xmlns:fb="http://www.gribuser.ru/xml/fictionbook/2.0">
<fb:description><fb:title-info><fb:book-title>Prefixed</fb:book-title><fb:unknown><x/></fb:unknown></fb:title-info></fb:description>
<fb:body><fb:section><fb:table><fb:tr/></fb:table><fb:p>kept</fb:p></fb:section></fb:body>
</fb:FictionBook>"#;
        let book = decode(xml.as_bytes(), true).unwrap();
        assert_eq!(book.description.title_info.book_title, "Prefixed");
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "kept");
    }

    #[test]
    fn test_root_namespaces_are_not_healed() {
        let xml = r#"<FictionBook xmlns="urn:wrong" xmlns:xlink="http://www.w3.org/1999/xlink"/>"#;
        let namespaces = root_namespaces(xml.as_bytes(), true).unwrap();
        assert_eq!(namespaces.fictionbook.as_deref(), Some("urn:wrong"));
        assert_eq!(namespaces.xlink.as_deref(), Some(XMLNS_XLINK));
        assert_eq!(namespaces.genre, None);
        assert!(namespaces.validate().is_err());

        let book = decode(xml.as_bytes(), true).unwrap();
        assert!(book.validate_namespaces().is_ok());
    }

    #[test]
    fn test_unexpected_root() {
        let err = decode(b"<html><body/></html>", false).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedRoot(name) if name == "html"));
    }

    #[test]
    fn test_missing_root() {
        let err = decode(b"<?xml version=\"1.0\"?>\n<!-- nothing -->", true).unwrap_err();
        assert!(matches!(err, DecodeError::MissingRoot));
    }

    #[test]
    fn test_unknown_entity_strict_vs_lenient() {
        let xml = wrap("<body><section><p>a&nbsp;b</p></section></body>");
        assert!(matches!(
            decode(xml.as_bytes(), true),
            Err(DecodeError::UnknownEntity(name)) if name == "nbsp"
        ));
        let book = decode(xml.as_bytes(), false).unwrap();
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "a&nbsp;b");
    }

    #[test]
    fn test_dangling_ampersand_strict_vs_lenient() {
        let xml = wrap("<body><section><p>Tom & Jerry</p></section></body>");
        assert!(decode(xml.as_bytes(), true).is_err());
        let book = decode(xml.as_bytes(), false).unwrap();
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "Tom & Jerry");
    }

    #[test]
    fn test_invalid_number_strict_vs_lenient() {
        let xml = wrap("").replace(
            "</title-info>",
            r#"<sequence name="Saga" number="first"/></title-info><publish-info><year>MMXX</year></publish-info>"#,
        );
        assert!(matches!(
            decode(xml.as_bytes(), true),
            Err(DecodeError::InvalidValue { field: "sequence number", .. })
        ));
        let book = decode(xml.as_bytes(), false).unwrap();
        let sequence = book.description.title_info.sequence.unwrap();
        assert_eq!(sequence.name, "Saga");
        assert_eq!(sequence.number, None);
        assert_eq!(book.description.publish_info.unwrap().year, None);
    }

    #[test]
    fn test_declared_entry_size_is_capped() {
        assert_eq!(initial_capacity(0), 0);
        assert_eq!(initial_capacity(4096), 4096);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOC);
        assert_eq!(initial_capacity(MAX_PREALLOC as u64 + 1), MAX_PREALLOC);
    }

    fn nested_sections(count: usize) -> String {
        let open = "<section>".repeat(count);
        let close = "</section>".repeat(count);
        wrap(&format!("<body>{open}<p>deep</p>{close}</body>"))
    }

    #[test]
    fn test_depth_limit_on_small_stack() {
        // FictionBook, body and the innermost p take three levels
        let at_limit = nested_sections(MAX_DEPTH - 3);
        let past_limit = nested_sections(MAX_DEPTH - 2);

        let handle = std::thread::Builder::new()
            .stack_size(2 << 20)
            .spawn(move || {
                let book = decode(at_limit.as_bytes(), true).unwrap();
                assert_eq!(book.bodies[0].sections[0].depth(), MAX_DEPTH - 4);

                for strict in [true, false] {
                    assert!(matches!(
                        decode(past_limit.as_bytes(), strict),
                        Err(DecodeError::TooDeep(MAX_DEPTH))
                    ));
                }
                let far_past = nested_sections(4 * MAX_DEPTH);
                assert!(matches!(
                    decode(far_past.as_bytes(), false),
                    Err(DecodeError::TooDeep(MAX_DEPTH))
                ));
            })
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_invalid_character_references() {
        for reference in ["&#0;", "&#1;", "&#xFFFE;", "&#xD800;"] {
            let xml = wrap(&format!("<body><section><p>a{reference}b</p></section></body>"));
            assert!(matches!(
                decode(xml.as_bytes(), true),
                Err(DecodeError::InvalidCharacterReference(_))
            ));
            let book = decode(xml.as_bytes(), false).unwrap();
            assert_eq!(
                book.bodies[0].sections[0].paragraphs[0].text,
                format!("a{reference}b")
            );
        }
    }

    #[test]
    fn test_raw_control_characters() {
        let xml = wrap("<body><section><p>a\u{1}b</p></section></body>");
        assert!(matches!(
            decode(xml.as_bytes(), true),
            Err(DecodeError::InvalidCharacter('\u{1}'))
        ));
        let book = decode(xml.as_bytes(), false).unwrap();
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "ab");

        let xml = wrap("<body name=\"x\u{1}y\"/>");
        assert!(decode(xml.as_bytes(), true).is_err());
        let book = decode(xml.as_bytes(), false).unwrap();
        assert_eq!(book.bodies[0].name.as_deref(), Some("xy"));
    }

    #[test]
    fn test_line_endings_are_normalized() {
        let xml = wrap("<body><section><p>a\r\nb\rc</p></section></body>");
        let book = decode(xml.as_bytes(), true).unwrap();
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "a\nb\nc");
    }

    #[test]
    fn test_block_order_is_recorded() {
        let xml = wrap(
            "<body><section><p>one</p><subtitle>S</subtitle><p>two</p><cite><p>c</p></cite>\
             <empty-line/><poem><stanza><v>v</v></stanza></poem></section></body>",
        );
        let book = decode(xml.as_bytes(), true).unwrap();
        let section = &book.bodies[0].sections[0];
        assert_eq!(
            section.order,
            [
                BlockKind::Paragraph,
                BlockKind::Subtitle,
                BlockKind::Paragraph,
                BlockKind::Cite,
                BlockKind::Poem,
            ]
        );
        assert_eq!(section.paragraphs.len(), 2);
        assert_eq!(section.cites[0].order, [BlockKind::Paragraph]);
    }

    #[test]
    fn test_windows_1251_declared_encoding() {
        let xml = wrap("<body><section><p>Привет, мир</p></section></body>")
            .replace("UTF-8", "windows-1251");
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(&xml);
        let book = decode(&bytes, true).unwrap();
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "Привет, мир");
    }

    #[test]
    fn test_undeclared_legacy_encoding() {
        let xml = wrap("<body><section><p>Мир</p></section></body>");
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(&xml);
        assert!(matches!(decode(&bytes, true), Err(DecodeError::Encoding)));
        let book = decode(&bytes, false).unwrap();
        assert_eq!(book.bodies[0].sections[0].paragraphs[0].text, "Мир");
    }
}
