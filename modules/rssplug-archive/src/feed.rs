// RSS/Atom/JSON feed parsing into the shared Feed type.

use feed_rs::model;
use tracing::warn;

use rssplug_common::{Feed, FeedItem, FetchError};

/// Parse raw feed bytes. Items keep document order (newest first by feed
/// convention).
pub fn parse_feed(bytes: &[u8], url: &str) -> Result<Feed, FetchError> {
    let parsed = feed_rs::parser::parse(bytes).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let items = parsed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let item = convert_entry(entry);
            if item.is_none() {
                warn!(feed_url = url, "feed: skipping entry without a link");
            }
            item
        })
        .collect();

    Ok(Feed {
        title: parsed.title.map(|t| t.content),
        items,
    })
}

fn convert_entry(entry: model::Entry) -> Option<FeedItem> {
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

    let image = cover_image(&entry.media);

    Some(FeedItem {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        link,
        content: entry.content.and_then(|c| c.body).unwrap_or_default(),
        summary: entry.summary.map(|t| t.content).unwrap_or_default(),
        image,
    })
}

/// First thumbnail, else the first image-typed media content.
fn cover_image(media: &[model::MediaObject]) -> Option<String> {
    let thumbnail = media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next();

    thumbnail.or_else(|| {
        media
            .iter()
            .flat_map(|m| m.content.iter())
            .find(|c| {
                c.content_type
                    .as_ref()
                    .is_some_and(|mime| mime.ty().as_str() == "image")
            })
            .and_then(|c| c.url.as_ref().map(|u| u.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Project Updates</title>
    <link>https://example.com</link>
    <description>News</description>
    <item>
      <title>Update #2</title>
      <link>https://example.com/updates/2</link>
      <description>&lt;p&gt;Second&lt;/p&gt;</description>
      <media:thumbnail url="https://example.com/cover2.png"/>
    </item>
    <item>
      <title>Update #1</title>
      <link>https://example.com/updates/1</link>
      <description>&lt;p&gt;First&lt;/p&gt;</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_in_document_order() {
        let feed = parse_feed(RSS.as_bytes(), "https://example.com/feed.xml").unwrap();

        assert_eq!(feed.title.as_deref(), Some("Project Updates"));
        let links: Vec<_> = feed.items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(
            links,
            vec!["https://example.com/updates/2", "https://example.com/updates/1"]
        );
        assert_eq!(feed.items[1].title, "Update #1");
        assert_eq!(feed.items[1].body(), "<p>First</p>");
    }

    #[test]
    fn thumbnail_becomes_cover_image() {
        let feed = parse_feed(RSS.as_bytes(), "https://example.com/feed.xml").unwrap();

        assert_eq!(
            feed.items[0].image.as_deref(),
            Some("https://example.com/cover2.png")
        );
        assert_eq!(feed.items[1].image, None);
    }

    #[test]
    fn image_media_content_becomes_cover_image() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Media</title>
    <link>https://example.com</link>
    <description>News</description>
    <item>
      <title>Clip</title>
      <link>https://example.com/clip</link>
      <media:content type="video/mp4" url="https://example.com/clip.mp4"/>
      <media:content type="image/png" url="https://example.com/still.png"/>
    </item>
    <item>
      <title>Audio only</title>
      <link>https://example.com/audio</link>
      <media:content type="audio/mpeg" url="https://example.com/track.mp3"/>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes(), "https://example.com/feed.xml").unwrap();

        assert_eq!(
            feed.items[0].image.as_deref(),
            Some("https://example.com/still.png")
        );
        assert_eq!(feed.items[1].image, None);
    }

    #[test]
    fn atom_content_is_preferred_over_summary() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:feed</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Entry</title>
    <id>urn:entry:1</id>
    <link href="https://example.com/e/1"/>
    <updated>2024-01-01T00:00:00Z</updated>
    <summary>short</summary>
    <content type="html">&lt;h2&gt;Long&lt;/h2&gt;</content>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes(), "https://example.com/atom").unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].link, "https://example.com/e/1");
        assert_eq!(feed.items[0].body(), "<h2>Long</h2>");
        assert_eq!(feed.items[0].summary, "short");
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_feed(b"not a feed", "https://example.com/bad").unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert_eq!(err.url(), "https://example.com/bad");
    }
}
