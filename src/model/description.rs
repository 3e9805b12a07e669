use super::body::Annotation;

/// Book metadata (`<description>`).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Description {
    pub title_info: TitleInfo,
    pub document_info: DocumentInfo,
    pub publish_info: Option<PublishInfo>,
    pub custom_info: Vec<CustomInfo>,
}

/// Bibliographic information about the book itself (`<title-info>`).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TitleInfo {
    /// Genre codes from the FB2 genre list (e.g. `sf_fantasy`).
    pub genres: Vec<String>,
    pub authors: Vec<Author>,
    pub book_title: String,
    pub annotation: Option<Annotation>,
    pub keywords: String,
    pub date: Date,
    pub coverpage: Coverpage,
    pub lang: String,
    /// Language of the original, for translations.
    pub src_lang: String,
    pub translators: Vec<Author>,
    pub sequence: Option<Sequence>,
}

/// A person credit, used for authors and translators alike.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Author {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub nickname: String,
    pub home_page: String,
    pub email: String,
}

impl Author {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    /// Human-readable name: the nickname when the name parts are all empty.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.nickname.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Cover image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coverpage {
    pub image: Option<Image>,
}

/// An `<image>` pointing at a binary via an `l:href="#id"` fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Image {
    pub href: String,
}

impl Image {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }

    /// The referenced binary id, or `None` for anything but a local fragment.
    pub fn binary_id(&self) -> Option<&str> {
        self.href.strip_prefix('#').filter(|id| !id.is_empty())
    }
}

/// A date with free-form text and an optional machine-readable `value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Date {
    pub value: Option<String>,
    pub text: String,
}

impl Date {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.text.is_empty()
    }
}

/// Series membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sequence {
    pub name: String,
    pub number: Option<u32>,
}

/// Information about the FB2 file (`<document-info>`).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentInfo {
    pub authors: Vec<Author>,
    pub program_used: String,
    pub date: Date,
    pub src_urls: Vec<String>,
    pub src_ocr: String,
    pub id: String,
    pub version: f64,
    pub history: Option<Annotation>,
}

/// Paper edition details (`<publish-info>`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublishInfo {
    pub book_name: String,
    pub publisher: String,
    pub city: String,
    pub year: Option<i32>,
    pub isbn: String,
    pub sequence: Option<Sequence>,
}

/// Free-form producer metadata (`<custom-info info-type="...">`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CustomInfo {
    pub info_type: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_binary_id() {
        assert_eq!(Image::new("#cover").binary_id(), Some("cover"));
        assert_eq!(Image::new("#").binary_id(), None);
        assert_eq!(Image::new("cover.jpg").binary_id(), None);
    }

    #[test]
    fn test_author_display_name() {
        let mut author = Author::new("John", "Doe");
        author.middle_name = "A.".to_string();
        assert_eq!(author.display_name(), "John A. Doe");

        let nick = Author {
            nickname: "jd".to_string(),
            ..Default::default()
        };
        assert_eq!(nick.display_name(), "jd");
    }
}
