//! Second-pass lookup of the coverpage image reference.
//!
//! Cover links are written with whatever prefix the producing tool chose
//! (`l:href`, `xlink:href`, bare `href`). The scan matches on local names
//! only, so the reference is recovered no matter how it was spelled.

use memchr::memmem;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::util::local_name;

use super::reader::attributes;

/// Find the href of the first `<image>` inside the first `<coverpage>`.
///
/// Takes the attribute whose local name is `href`, falling back to the
/// image's first attribute. Returns `None` when there is no coverpage, no
/// image, or only an empty value. Malformed XML ends the scan quietly.
pub fn scan_coverpage_href(text: &str) -> Option<String> {
    memmem::find(text.as_bytes(), b"coverpage")?;

    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut in_coverpage = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if !in_coverpage => {
                in_coverpage = local_name(e.name().into_inner()) == b"coverpage";
            }
            Ok(Event::Empty(e)) if !in_coverpage => {
                if local_name(e.name().into_inner()) == b"coverpage" {
                    return None;
                }
            }
            Ok(Event::Start(e) | Event::Empty(e)) if in_coverpage => {
                if local_name(e.name().into_inner()) != b"image" {
                    continue;
                }
                let attrs = attributes(&e, reader.decoder(), false).ok()?;
                let href = attrs
                    .iter()
                    .find(|(key, _)| local_name(key.as_bytes()) == b"href")
                    .or_else(|| attrs.first())
                    .map(|(_, value)| value.clone())?;
                return (!href.is_empty()).then_some(href);
            }
            Ok(Event::End(e)) if in_coverpage => {
                if local_name(e.name().into_inner()) == b"coverpage" {
                    return None;
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_prefixed_href() {
        let xml = r##"<FictionBook><description><title-info>
            <coverpage><image l:href="#cover.jpg"/></coverpage>
            </title-info></description></FictionBook>"##;
        assert_eq!(scan_coverpage_href(xml).as_deref(), Some("#cover.jpg"));
    }

    #[test]
    fn test_scan_any_prefix() {
        let xml = r##"<coverpage><x:image x:href="#a"/></coverpage>"##;
        assert_eq!(scan_coverpage_href(xml).as_deref(), Some("#a"));
    }

    #[test]
    fn test_scan_falls_back_to_first_attribute() {
        let xml = r##"<coverpage><image src="#b" alt="x"/></coverpage>"##;
        assert_eq!(scan_coverpage_href(xml).as_deref(), Some("#b"));
    }

    #[test]
    fn test_scan_only_first_coverpage() {
        let xml = r##"<coverpage></coverpage><coverpage><image href="#c"/></coverpage>"##;
        assert_eq!(scan_coverpage_href(xml), None);
    }

    #[test]
    fn test_scan_ignores_images_outside_coverpage() {
        let xml = r##"<body><image href="#d"/></body><coverpage/>"##;
        assert_eq!(scan_coverpage_href(xml), None);
    }

    #[test]
    fn test_scan_empty_and_missing() {
        assert_eq!(scan_coverpage_href(r#"<coverpage><image href=""/></coverpage>"#), None);
        assert_eq!(scan_coverpage_href("<FictionBook/>"), None);
        assert_eq!(scan_coverpage_href("<coverpage><image"), None);
    }
}
