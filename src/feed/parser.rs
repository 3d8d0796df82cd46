use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors produced while decoding an RSS document.
#[derive(Debug, Error)]
pub enum FeedParseError {
    /// The bytes are not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),
    /// Well-formed XML whose root element is not `<rss>`.
    #[error("not an RSS document: root element is <{0}>")]
    NotRss(String),
    /// An `<rss>` document without a `<channel>`.
    #[error("RSS document has no <channel> element")]
    MissingChannel,
}

/// A decoded RSS 2.0 document, kept as close to the wire text as possible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeed {
    pub channel: Channel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub title: String,
    pub description: String,
    pub link: String,
    pub image: Option<Image>,
    pub generator: String,
    pub last_build_date: String,
    pub copyright: String,
    pub language: String,
    /// Minutes the channel may be cached, when present and numeric.
    pub ttl: Option<u32>,
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    pub url: String,
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publish date exactly as written in `<pubDate>`.
    pub pub_date: String,
    pub guid: Option<Guid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guid {
    pub value: String,
    /// `isPermaLink` attribute; RSS treats a missing attribute as `true`.
    pub is_permalink: bool,
}

/// Where an element sits relative to the parts of the document we keep.
enum Scope {
    Root,
    Channel,
    Image,
    Item,
    Elsewhere,
}

fn scope(ancestors: &[String]) -> Scope {
    let names: Vec<&str> = ancestors.iter().map(String::as_str).collect();
    match names.as_slice() {
        ["rss"] => Scope::Root,
        ["rss", "channel"] => Scope::Channel,
        ["rss", "channel", "image"] => Scope::Image,
        ["rss", "channel", "item"] => Scope::Item,
        _ => Scope::Elsewhere,
    }
}

#[derive(Default)]
struct Builder {
    channel: Option<Channel>,
    item: Option<RawItem>,
    guid_permalink: Option<bool>,
}

impl Builder {
    fn open(&mut self, name: &str, ancestors: &[String], e: &BytesStart<'_>) {
        match (scope(ancestors), name) {
            (Scope::Root, "channel") => {
                self.channel.get_or_insert_with(Channel::default);
            }
            (Scope::Channel, "image") => {
                if let Some(channel) = self.channel.as_mut() {
                    channel.image = Some(Image::default());
                }
            }
            (Scope::Channel, "item") => self.item = Some(RawItem::default()),
            (Scope::Item, "guid") => {
                let permalink = e
                    .try_get_attribute("isPermaLink")
                    .ok()
                    .flatten()
                    .and_then(|attr| attr.unescape_value().ok().map(|v| v.trim().to_owned()));
                self.guid_permalink = Some(!matches!(permalink.as_deref(), Some("false")));
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str, ancestors: &[String], text: String) {
        let value = text.trim().to_string();
        match scope(ancestors) {
            Scope::Channel => {
                let Some(channel) = self.channel.as_mut() else {
                    return;
                };
                match name {
                    "title" => channel.title = value,
                    "description" => channel.description = value,
                    "link" => channel.link = value,
                    "generator" => channel.generator = value,
                    "lastBuildDate" => channel.last_build_date = value,
                    "copyright" => channel.copyright = value,
                    "language" => channel.language = value,
                    "ttl" => channel.ttl = value.parse().ok(),
                    "item" => {
                        if let Some(item) = self.item.take() {
                            channel.items.push(item);
                        }
                    }
                    _ => {}
                }
            }
            Scope::Image => {
                let Some(image) = self.channel.as_mut().and_then(|c| c.image.as_mut()) else {
                    return;
                };
                match name {
                    "url" => image.url = value,
                    "title" => image.title = value,
                    "link" => image.link = value,
                    _ => {}
                }
            }
            Scope::Item => {
                let Some(item) = self.item.as_mut() else {
                    return;
                };
                match name {
                    "title" => item.title = value,
                    "link" => item.link = value,
                    "description" => item.description = value,
                    "pubDate" => item.pub_date = value,
                    "guid" => {
                        item.guid = Some(Guid {
                            value,
                            is_permalink: self.guid_permalink.take().unwrap_or(true),
                        })
                    }
                    _ => {}
                }
            }
            Scope::Root | Scope::Elsewhere => {}
        }
    }
}

/// Decodes an RSS 2.0 document.
///
/// Only un-prefixed RSS elements are read; namespaced extensions such as
/// `atom:link` or `media:thumbnail` are skipped. Text may be plain,
/// entity-escaped or CDATA.
///
/// # Errors
///
/// - [`FeedParseError::Xml`] for malformed or truncated XML
/// - [`FeedParseError::NotRss`] when the root element is not `<rss>`
/// - [`FeedParseError::MissingChannel`] when `<channel>` is absent
pub fn parse_rss(bytes: &[u8]) -> Result<RawFeed, FeedParseError> {
    // quick-xml (0.37) never expands <!ENTITY> declarations, so DOCTYPE-based
    // entity tricks fail in unescape() instead of being resolved.
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    // Open elements with the text gathered inside each so far
    let mut open: Vec<(String, String)> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut builder = Builder::default();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = element_name(&e)?;
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                }
                builder.open(&name, &names, &e);
                names.push(name.clone());
                open.push((name, String::new()));
            }
            Ok(Event::Empty(e)) => {
                let name = element_name(&e)?;
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                }
                builder.open(&name, &names, &e);
                builder.close(&name, &names, String::new());
            }
            Ok(Event::End(_)) => {
                let Some((name, text)) = open.pop() else {
                    return Err(FeedParseError::Xml("unexpected closing tag".into()));
                };
                names.pop();
                if let Some((_, parent_text)) = open.last_mut() {
                    // Mixed content (e.g. <b> inside a description) stays with its parent
                    parent_text.push_str(&text);
                }
                builder.close(&name, &names, text);
            }
            Ok(Event::Text(t)) => {
                if let Some((_, text)) = open.last_mut() {
                    match t.unescape() {
                        Ok(s) => text.push_str(&s),
                        // HTML entities such as &nbsp; are kept verbatim
                        Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, text)) = open.last_mut() {
                    let s = std::str::from_utf8(&c)
                        .map_err(|e| FeedParseError::Xml(format!("invalid UTF-8 in CDATA: {e}")))?;
                    text.push_str(s);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedParseError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err(FeedParseError::Xml(format!(
            "unexpected end of document inside <{}>",
            open.last().map(|(n, _)| n.as_str()).unwrap_or_default()
        )));
    }
    if !saw_root {
        return Err(FeedParseError::Xml("document has no root element".into()));
    }

    let channel = builder.channel.ok_or(FeedParseError::MissingChannel)?;
    Ok(RawFeed { channel })
}

fn element_name(e: &BytesStart<'_>) -> Result<String, FeedParseError> {
    std::str::from_utf8(e.name().as_ref())
        .map(str::to_owned)
        .map_err(|err| FeedParseError::Xml(format!("invalid UTF-8 in element name: {err}")))
}

fn check_root(name: &str) -> Result<(), FeedParseError> {
    if name == "rss" {
        Ok(())
    } else {
        Err(FeedParseError::NotRss(name.to_string()))
    }
}
