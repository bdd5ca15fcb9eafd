use chrono::{DateTime, Datelike, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::Cursor;
use thiserror::Error;
use url::Url;

use super::types::{host_label, Article};

const GENERATOR: &str = concat!("sitefeed ", env!("CARGO_PKG_VERSION"));
const RSS_DOCS: &str = "https://www.rssboard.org/rss-specification";
const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// Errors while serializing a document. Writing into memory only fails on
/// encoding problems, so callers can treat these as internal errors.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Failed to write feed XML: {0}")]
    Write(#[from] std::io::Error),
    #[error("Generated feed contains invalid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Feed-level fields of a synthesized document.
#[derive(Debug, Clone, Copy)]
pub struct Channel<'a> {
    pub source_url: &'a Url,
    pub title: &'a str,
    pub description: &'a str,
    pub language: &'a str,
}

/// Serializes `articles` as an RSS 2.0 document.
///
/// Every article becomes exactly one `<item>` whose `<link>` and permalink
/// `<guid>` are the article URL. Articles without a publish time are stamped
/// with `now`, which also supplies `lastBuildDate` and the copyright year.
pub fn synthesize(
    channel: &Channel<'_>,
    articles: &[Article],
    now: DateTime<Utc>,
) -> Result<String, SynthError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:dc", DC_NAMESPACE));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    let now_rfc2822 = now.to_rfc2822();
    let copyright = format!("Copyright {} {}", now.year(), host_label(channel.source_url));

    write_text_element(&mut writer, "title", channel.title)?;
    write_text_element(&mut writer, "link", channel.source_url.as_str())?;
    write_text_element(&mut writer, "description", channel.description)?;
    write_text_element(&mut writer, "language", channel.language)?;
    write_text_element(&mut writer, "lastBuildDate", &now_rfc2822)?;
    write_text_element(&mut writer, "generator", GENERATOR)?;
    write_text_element(&mut writer, "copyright", &copyright)?;
    write_text_element(&mut writer, "docs", RSS_DOCS)?;

    for article in articles {
        write_item(&mut writer, article, &now_rfc2822)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_item<W: std::io::Write>(
    writer: &mut Writer<W>,
    article: &Article,
    now_rfc2822: &str,
) -> Result<(), SynthError> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    write_text_element(writer, "title", &article.title)?;
    write_text_element(writer, "link", &article.url)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "true"));
    writer.write_event(Event::Start(guid))?;
    writer.write_event(Event::Text(BytesText::new(&xml_safe(&article.url))))?;
    writer.write_event(Event::End(BytesEnd::new("guid")))?;

    write_text_element(
        writer,
        "description",
        article.description.as_deref().unwrap_or(""),
    )?;

    match article.published_at {
        Some(published) => write_text_element(writer, "pubDate", &published.to_rfc2822())?,
        None => write_text_element(writer, "pubDate", now_rfc2822)?,
    }

    if let Some(author) = &article.author {
        write_text_element(writer, "dc:creator", author)?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), SynthError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(&xml_safe(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Drops characters XML 1.0 cannot carry: C0 controls other than tab, LF and
/// CR, plus the noncharacters U+FFFE and U+FFFF.
fn xml_safe(text: &str) -> Cow<'_, str> {
    let invalid = |c: char| {
        (c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r'))
            || matches!(c, '\u{FFFE}' | '\u{FFFF}')
    };
    if text.chars().any(invalid) {
        Cow::Owned(text.chars().filter(|&c| !invalid(c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn article(i: usize) -> Article {
        Article {
            title: format!("Post {i}"),
            url: format!("https://example.com/posts/{i}"),
            description: None,
            published_at: None,
            author: None,
        }
    }

    fn render(articles: &[Article]) -> String {
        let source = Url::parse("https://example.com/").unwrap();
        let channel = Channel {
            source_url: &source,
            title: "Example",
            description: "Example feed",
            language: "en",
        };
        synthesize(&channel, articles, now()).unwrap()
    }

    #[test]
    fn test_one_item_per_article_with_matching_links() {
        let articles: Vec<Article> = (0..5).map(article).collect();
        let xml = render(&articles);

        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.entries.len(), 5);
        for (entry, article) in parsed.entries.iter().zip(&articles) {
            assert_eq!(entry.links[0].href, article.url);
            assert_eq!(entry.title.as_ref().unwrap().content, article.title);
        }
    }

    #[test]
    fn test_channel_metadata() {
        let xml = render(&[]);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">"#));
        assert!(xml.contains("<title>Example</title>"));
        assert!(xml.contains("<link>https://example.com/</link>"));
        assert!(xml.contains("<language>en</language>"));
        assert!(xml.contains("<lastBuildDate>Sun, 1 Jun 2025 12:00:00 +0000</lastBuildDate>"));
        assert!(xml.contains("<copyright>Copyright 2025 example.com</copyright>"));
        assert!(xml.contains("<generator>sitefeed "));
        assert!(!xml.contains("<item>"));
    }

    #[test]
    fn test_item_fields() {
        let mut a = article(1);
        a.description = Some("Summary".into());
        a.published_at = Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap());
        a.author = Some("Ada Lovelace".into());
        let xml = render(&[a, article(2)]);

        assert!(xml.contains(r#"<guid isPermaLink="true">https://example.com/posts/1</guid>"#));
        assert!(xml.contains("<description>Summary</description>"));
        assert!(xml.contains("<pubDate>Tue, 5 Mar 2024 10:00:00 +0000</pubDate>"));
        assert!(xml.contains("<dc:creator>Ada Lovelace</dc:creator>"));
        // Missing description and date: empty description, synthesis time.
        assert!(xml.contains("<description></description>"));
        assert!(xml.contains("<pubDate>Sun, 1 Jun 2025 12:00:00 +0000</pubDate>"));
    }

    #[test]
    fn test_escaping_and_control_chars() {
        let mut a = article(1);
        a.title = "Fish & <Chips>\u{7}".into();
        a.url = "https://example.com/a?x=1&y=2".into();
        let xml = render(&[a]);

        assert!(xml.contains("<title>Fish &amp; &lt;Chips&gt;</title>"));
        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.entries[0].links[0].href, "https://example.com/a?x=1&y=2");
        assert_eq!(parsed.entries[0].title.as_ref().unwrap().content, "Fish & <Chips>");
    }

    #[test]
    fn test_xml_noncharacters_dropped() {
        let mut a = article(1);
        a.title = "Bad \u{FFFF} title\u{FFFE}".into();
        a.description = Some("\u{FFFF}Summary".into());
        let xml = render(&[a]);

        assert!(!xml.contains('\u{FFFF}'));
        assert!(!xml.contains('\u{FFFE}'));
        assert!(xml.contains("<title>Bad  title</title>"));
        assert!(xml.contains("<description>Summary</description>"));
        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn test_author_round_trips_through_parser() {
        let mut a = article(1);
        a.author = Some("Grace Hopper".into());
        let xml = render(&[a]);
        let parsed = feed_rs::parser::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.entries[0].authors[0].name, "Grace Hopper");
    }
}
