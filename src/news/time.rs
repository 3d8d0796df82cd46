//! Publish-date parsing for the date formats seen in provider feeds.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc, Weekday};

use super::error::NewsError;

/// How the remainder of a date string is interpreted once a layout matches.
#[derive(Clone, Copy)]
enum Shape {
    /// Full timestamp with a numeric UTC offset (`%z`).
    Zoned,
    /// Timestamp without an offset, taken as UTC.
    Naive,
    /// Date only, taken as midnight UTC.
    Date,
}

struct Layout {
    /// Input starts with a day name followed by `", "`.
    weekday: bool,
    format: &'static str,
    shape: Shape,
}

const fn layout(weekday: bool, format: &'static str, shape: Shape) -> Layout {
    Layout {
        weekday,
        format,
        shape,
    }
}

/// Tried in order; the first layout that parses wins.
const LAYOUTS: &[Layout] = &[
    layout(true, "%d %b %Y %H:%M:%S GMT", Shape::Naive),
    layout(true, "%d %b %Y %H:%M:%S %z", Shape::Zoned),
    layout(false, "%Y-%m-%d", Shape::Date),
    layout(false, "%d-%m-%Y", Shape::Date),
    layout(false, "%Y-%m-%d %H:%M:%S", Shape::Naive),
    layout(false, "%d-%m-%Y %H:%M:%S", Shape::Naive),
    layout(false, "%b %d, %Y", Shape::Date),
    layout(false, "%B %d, %Y", Shape::Date),
    layout(true, "%b %d, %Y", Shape::Date),
    layout(true, "%B %d, %Y", Shape::Date),
    layout(false, "%b %d, %Y %H:%M:%S", Shape::Naive),
    layout(false, "%B %d, %Y %H:%M:%S", Shape::Naive),
    layout(true, "%b %d, %Y %H:%M:%S", Shape::Naive),
    layout(true, "%B %d, %Y %H:%M:%S", Shape::Naive),
];

/// Parses a feed publish-date string into a UTC timestamp.
///
/// A leading day name (`"Mon, "`) is accepted but not checked against the
/// date, since feeds frequently get it wrong.
///
/// # Errors
///
/// Returns [`NewsError::Parse`] naming the input when no layout matches.
pub fn parse_publish_date(input: &str) -> Result<DateTime<Utc>, NewsError> {
    let input = input.trim();
    let without_weekday = strip_weekday(input);

    for layout in LAYOUTS {
        let text = if layout.weekday {
            match without_weekday {
                Some(rest) => rest,
                None => continue,
            }
        } else {
            input
        };

        if let Some(ts) = parse_with(text, layout) {
            return Ok(ts);
        }
    }

    Err(NewsError::Parse(format!(
        "unable to parse time from input string: {input}"
    )))
}

fn parse_with(text: &str, layout: &Layout) -> Option<DateTime<Utc>> {
    match layout.shape {
        Shape::Zoned => DateTime::parse_from_str(text, layout.format)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Shape::Naive => NaiveDateTime::parse_from_str(text, layout.format)
            .ok()
            .map(|dt| dt.and_utc()),
        Shape::Date => NaiveDate::parse_from_str(text, layout.format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
    }
}

fn strip_weekday(input: &str) -> Option<&str> {
    let (day, rest) = input.split_once(", ")?;
    day.parse::<Weekday>().ok()?;
    Some(rest)
}
