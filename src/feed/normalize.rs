use super::parser::RawFeed;
use crate::news::time::parse_publish_date;
use crate::news::{NewsError, NewsItem, Provider};

/// Converts a decoded feed into news items tagged with `provider`.
///
/// Items keep document order and inherit the channel image URL as their
/// logo (empty when the channel has no image). One unparseable publish date
/// fails the whole feed.
pub fn normalize(feed: RawFeed, provider: Provider) -> Result<Vec<NewsItem>, NewsError> {
    let channel = feed.channel;
    let logo = channel.image.map(|image| image.url).unwrap_or_default();

    channel
        .items
        .into_iter()
        .map(|item| {
            Ok(NewsItem {
                publish_date: parse_publish_date(&item.pub_date)?,
                title: item.title,
                description: item.description,
                link: item.link,
                provider,
                provider_logo_url: logo.clone(),
            })
        })
        .collect()
}
