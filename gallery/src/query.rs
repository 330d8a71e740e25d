//! Search, date filter and sort over a snapshot of the store.

use chrono::{DateTime, Datelike, Local, TimeZone};
use lookup_client::PhotoRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateFilter {
    #[default]
    All,
    ThisMonth,
    ThisYear,
}

impl DateFilter {
    pub const ALL: [DateFilter; 3] = [DateFilter::All, DateFilter::ThisMonth, DateFilter::ThisYear];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Date,
    Location,
    Weather,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Date, SortKey::Location, SortKey::Weather];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

impl std::fmt::Display for DateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DateFilter::All => "All",
            DateFilter::ThisMonth => "This Month",
            DateFilter::ThisYear => "This Year",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SortKey::Date => "Date",
            SortKey::Location => "Location",
            SortKey::Weather => "Weather",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "all" => Ok(DateFilter::All),
            "thismonth" | "month" => Ok(DateFilter::ThisMonth),
            "thisyear" | "year" => Ok(DateFilter::ThisYear),
            other => Err(format!("unknown date filter: {}", other)),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "location" => Ok(SortKey::Location),
            "weather" => Ok(SortKey::Weather),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(format!("unknown sort direction: {}", other)),
        }
    }
}

/// Query parameters, passed by value on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub search_term: String,
    pub date_filter: DateFilter,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
}

impl QuerySpec {
    pub fn has_search(&self) -> bool {
        !self.search_term.trim().is_empty()
    }

    /// Whether anything narrows the result set.
    pub fn is_narrowing(&self) -> bool {
        self.has_search() || self.date_filter != DateFilter::All
    }
}

/// `M/D/YYYY`, the date form users type into the search box.
pub fn calendar_date<Tz: TimeZone>(record: &PhotoRecord, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    record
        .captured_at()
        .with_timezone(tz)
        .format("%-m/%-d/%Y")
        .to_string()
}

/// Compact date for the detail view, e.g. `Mar 9, 2024, 08:15 AM`.
pub fn format_capture_date<Tz: TimeZone>(record: &PhotoRecord, tz: &Tz) -> String
where
    Tz::Offset: Display,
{
    record
        .captured_at()
        .with_timezone(tz)
        .format("%b %-d, %Y, %I:%M %p")
        .to_string()
}

fn matches_search<Tz: TimeZone>(record: &PhotoRecord, needle: &str, tz: &Tz) -> bool
where
    Tz::Offset: Display,
{
    let contains = |field: &Option<String>| {
        field
            .as_deref()
            .map(|v| v.to_lowercase().contains(needle))
            .unwrap_or(false)
    };
    contains(&record.address) || contains(&record.weather) || calendar_date(record, tz).contains(needle)
}

fn matches_date<Tz: TimeZone>(record: &PhotoRecord, filter: DateFilter, now: &DateTime<Tz>) -> bool {
    let taken = record.captured_at().with_timezone(&now.timezone());
    match filter {
        DateFilter::All => true,
        DateFilter::ThisMonth => taken.year() == now.year() && taken.month() == now.month(),
        DateFilter::ThisYear => taken.year() == now.year(),
    }
}

/// Locale-style ordering: case-insensitive first, lowercase before
/// uppercase on ties, then code points.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

fn compare(a: &PhotoRecord, b: &PhotoRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => a.timestamp.cmp(&b.timestamp),
        SortKey::Location => locale_compare(
            a.address.as_deref().unwrap_or(""),
            b.address.as_deref().unwrap_or(""),
        ),
        SortKey::Weather => locale_compare(
            a.weather.as_deref().unwrap_or(""),
            b.weather.as_deref().unwrap_or(""),
        ),
    }
}

/// Evaluates `query` against `records` with "now" taken from the local clock.
pub fn evaluate(records: &[PhotoRecord], query: &QuerySpec) -> Vec<PhotoRecord> {
    evaluate_at(records, query, &Local::now())
}

/// Evaluates `query` with an explicit "now"; its timezone decides calendar
/// months, years and the searchable date text.
pub fn evaluate_at<Tz: TimeZone>(
    records: &[PhotoRecord],
    query: &QuerySpec,
    now: &DateTime<Tz>,
) -> Vec<PhotoRecord>
where
    Tz::Offset: Display,
{
    let tz = now.timezone();
    let needle = query.search_term.to_lowercase();
    let searching = query.has_search();

    let mut result: Vec<PhotoRecord> = records
        .iter()
        .filter(|r| !searching || matches_search(r, &needle, &tz))
        .filter(|r| matches_date(r, query.date_filter, now))
        .cloned()
        .collect();

    let key = query.sort_key;
    match query.sort_direction {
        SortDirection::Ascending => result.sort_by(|a, b| compare(a, b, key)),
        SortDirection::Descending => result.sort_by(|a, b| compare(a, b, key).reverse()),
    }
    result
}

/// Header counters shown above the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub total: usize,
    pub this_month: usize,
    pub this_year: usize,
}

pub fn breakdown_at<Tz: TimeZone>(records: &[PhotoRecord], now: &DateTime<Tz>) -> Breakdown {
    Breakdown {
        total: records.len(),
        this_month: records
            .iter()
            .filter(|r| matches_date(r, DateFilter::ThisMonth, now))
            .count(),
        this_year: records
            .iter()
            .filter(|r| matches_date(r, DateFilter::ThisYear, now))
            .count(),
    }
}

pub fn breakdown(records: &[PhotoRecord]) -> Breakdown {
    breakdown_at(records, &Local::now())
}

/// "`N of M photos matching "term"`", only while the query narrows results.
pub fn result_summary(query: &QuerySpec, shown: usize, total: usize) -> Option<String> {
    if !query.is_narrowing() {
        return None;
    }
    let mut summary = format!("{} of {} photos", shown, total);
    if query.has_search() {
        summary.push_str(&format!(" matching \"{}\"", query.search_term));
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use lookup_client::Coordinates;

    fn record(id: &str, ts: i64, address: Option<&str>, weather: Option<&str>) -> PhotoRecord {
        PhotoRecord {
            id: id.into(),
            uri: format!("file:///{}.jpg", id),
            timestamp: ts,
            coordinates: address.or(weather).map(|_| Coordinates::new(0.5, 0.5)),
            address: address.map(String::from),
            weather: weather.map(String::from),
        }
    }

    fn ms(y: i32, m: u32, d: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap().timestamp_millis()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_locale_compare() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("", "a"), Ordering::Less);
        assert_eq!(locale_compare("Rain", "rain"), Ordering::Greater);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let records = vec![record("p", ms(2024, 1, 1), Some("Paris Cafe"), None)];
        let mut query = QuerySpec {
            search_term: "cafe".into(),
            ..Default::default()
        };
        assert_eq!(evaluate_at(&records, &query, &now()).len(), 1);
        query.search_term = "tokyo".into();
        assert!(evaluate_at(&records, &query, &now()).is_empty());
    }

    #[test]
    fn test_search_matches_weather_and_date() {
        let records = vec![
            record("rainy", ms(2024, 3, 7), Some("Oslo"), Some("Heavy rain, 4°C")),
            record("bare", ms(2023, 12, 25), None, None),
        ];
        let query = QuerySpec {
            search_term: "RAIN".into(),
            ..Default::default()
        };
        let ids: Vec<_> = evaluate_at(&records, &query, &now()).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["rainy"]);

        let query = QuerySpec {
            search_term: "12/25/2023".into(),
            ..Default::default()
        };
        let ids: Vec<_> = evaluate_at(&records, &query, &now()).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["bare"]);
    }

    #[test]
    fn test_calendar_date_uses_query_timezone() {
        let late = Utc.with_ymd_and_hms(2024, 1, 31, 23, 30, 0).unwrap().timestamp_millis();
        let r = record("late", late, None, None);
        assert_eq!(calendar_date(&r, &Utc), "1/31/2024");
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(calendar_date(&r, &plus_two), "2/1/2024");
    }

    #[test]
    fn test_whitespace_term_matches_everything() {
        let records = vec![record("a", 1, None, None), record("b", 2, None, None)];
        let query = QuerySpec {
            search_term: "   ".into(),
            ..Default::default()
        };
        assert_eq!(evaluate_at(&records, &query, &now()).len(), 2);
    }

    #[test]
    fn test_date_filters() {
        let records = vec![
            record("june", ms(2024, 6, 2), None, None),
            record("jan", ms(2024, 1, 20), None, None),
            record("last_june", ms(2023, 6, 2), None, None),
        ];
        let ids = |filter| {
            let query = QuerySpec {
                date_filter: filter,
                ..Default::default()
            };
            evaluate_at(&records, &query, &now())
                .into_iter()
                .map(|r| r.id)
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(DateFilter::ThisMonth), vec!["june"]);
        assert_eq!(ids(DateFilter::ThisYear), vec!["june", "jan"]);
        assert_eq!(ids(DateFilter::All).len(), 3);
    }

    #[test]
    fn test_default_sort_and_reverse() {
        let records = vec![
            record("a", 3, None, None),
            record("b", 1, None, None),
            record("c", 3, None, None),
            record("d", 2, None, None),
        ];
        let mut query = QuerySpec::default();
        let ids = |query: &QuerySpec| -> Vec<String> {
            evaluate_at(&records, query, &now()).into_iter().map(|r| r.id).collect()
        };
        let descending = ids(&query);
        assert_eq!(descending, vec!["a", "c", "d", "b"]);
        let stamps: Vec<i64> = evaluate_at(&records, &query, &now())
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] >= w[1]));

        query.sort_direction = query.sort_direction.toggled();
        assert_eq!(ids(&query), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_sort_by_weather() {
        let records = vec![
            record("snow", 1, None, Some("Snow fall, -2°C")),
            record("clear", 2, None, Some("clear sky, 25°C")),
            record("bare", 3, None, None),
            record("fog", 4, None, Some("Fog, 8°C")),
        ];
        let query = QuerySpec {
            sort_key: SortKey::Weather,
            sort_direction: SortDirection::Ascending,
            ..Default::default()
        };
        let ids: Vec<_> = evaluate_at(&records, &query, &now()).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["bare", "clear", "fog", "snow"]);
    }

    #[test]
    fn test_absent_location_sorts_first_ascending() {
        let records = vec![
            record("z", 1, Some("Zurich"), None),
            record("none", 2, None, None),
            record("a", 3, Some("amsterdam"), None),
        ];
        let query = QuerySpec {
            sort_key: SortKey::Location,
            sort_direction: SortDirection::Ascending,
            ..Default::default()
        };
        let ids: Vec<_> = evaluate_at(&records, &query, &now()).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["none", "a", "z"]);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let records = vec![record("a", 1, None, None), record("b", 2, None, None)];
        let before = records.clone();
        let _ = evaluate_at(&records, &QuerySpec::default(), &now());
        assert_eq!(records, before);
    }

    #[test]
    fn test_breakdown_and_summary() {
        let records = vec![
            record("june", ms(2024, 6, 2), None, None),
            record("jan", ms(2024, 1, 20), None, None),
            record("old", ms(2020, 6, 2), None, None),
        ];
        let b = breakdown_at(&records, &now());
        assert_eq!(
            b,
            Breakdown {
                total: 3,
                this_month: 1,
                this_year: 2
            }
        );

        assert_eq!(result_summary(&QuerySpec::default(), 3, 3), None);
        let query = QuerySpec {
            search_term: "cafe".into(),
            ..Default::default()
        };
        assert_eq!(
            result_summary(&query, 1, 3).as_deref(),
            Some("1 of 3 photos matching \"cafe\"")
        );
        let query = QuerySpec {
            date_filter: DateFilter::ThisYear,
            ..Default::default()
        };
        assert_eq!(result_summary(&query, 2, 3).as_deref(), Some("2 of 3 photos"));
    }

    #[test]
    fn test_format_capture_date() {
        let r = record("r", Utc.with_ymd_and_hms(2024, 3, 9, 20, 5, 0).unwrap().timestamp_millis(), None, None);
        assert_eq!(format_capture_date(&r, &Utc), "Mar 9, 2024, 08:05 PM");
    }

    #[test]
    fn test_parse_query_enums() {
        assert_eq!("this-month".parse::<DateFilter>(), Ok(DateFilter::ThisMonth));
        assert_eq!("Weather".parse::<SortKey>(), Ok(SortKey::Weather));
        assert_eq!("asc".parse::<SortDirection>(), Ok(SortDirection::Ascending));
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
