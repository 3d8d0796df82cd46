use super::types::{NewsItem, SortDirection};

/// Orders items by publish date in place.
///
/// The sort is stable: items sharing a timestamp keep their merge order in
/// both directions.
pub fn sort_by_publish_date(items: &mut [NewsItem], direction: SortDirection) {
    match direction {
        SortDirection::Asc => items.sort_by(|a, b| a.publish_date.cmp(&b.publish_date)),
        SortDirection::Desc => items.sort_by(|a, b| b.publish_date.cmp(&a.publish_date)),
    }
}
