//! iCalendar document parser.
//!
//! Parses raw feed bytes into normalized [`CalendarEvent`] records. Parsing is
//! best-effort per entry: an individually malformed `VEVENT` is reported as a
//! skipped item with a reason, never as a document failure. Only a document
//! whose overall structure cannot be recognized (not UTF-8, or no
//! `BEGIN:VCALENDAR` envelope) fails with [`ParseError::MalformedDocument`].
//!
//! All timestamps are normalized to UTC before they leave this module, so the
//! rest of the system never sees a source time zone.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::ParseError;
use crate::types::CalendarEvent;

/// Policy options applied while normalizing events.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Duration assigned to a timed event with no `DTEND`/`DURATION`.
    pub default_event_duration: Duration,
    /// Duration assigned to an all-day event with no `DTEND`.
    pub default_all_day_duration: Duration,
    /// Events ending strictly before this instant are skipped as `InPast`.
    pub horizon: Option<DateTime<Utc>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_event_duration: Duration::hours(1),
            default_all_day_duration: Duration::days(1),
            horizon: None,
        }
    }
}

/// Why an individual `VEVENT` was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingUid,
    MissingStart,
    BadTimestamp { field: String, value: String },
    InPast,
    Unterminated,
}

/// Result of parsing one `VEVENT` block.
#[derive(Debug, Clone)]
pub enum ParsedItem {
    Parsed(CalendarEvent),
    Skipped(SkipReason),
}

/// Aggregated outcome of parsing a whole document.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub events: Vec<CalendarEvent>,
    pub skipped: Vec<SkipReason>,
}

impl ParseReport {
    fn push(&mut self, item: ParsedItem) {
        match item {
            ParsedItem::Parsed(event) => self.events.push(event),
            ParsedItem::Skipped(reason) => self.skipped.push(reason),
        }
    }
}

/// Parse raw feed bytes into a normalized parse report.
///
/// Deterministic: the same bytes always yield the same event sequence and the
/// same fingerprint per event.
pub fn parse_ical(bytes: &[u8], options: &ParseOptions) -> Result<ParseReport, ParseError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ParseError::MalformedDocument(format!("document is not UTF-8: {e}")))?;

    let lines = unfold_lines(text);

    if !lines.iter().any(|line| line.eq_ignore_ascii_case("BEGIN:VCALENDAR")) {
        return Err(ParseError::MalformedDocument(
            "missing BEGIN:VCALENDAR envelope".to_string(),
        ));
    }

    let mut report = ParseReport::default();
    let mut current: Option<Vec<Property>> = None;

    for line in &lines {
        if line.eq_ignore_ascii_case("BEGIN:VEVENT") {
            // A BEGIN inside an open event means the previous block never
            // terminated; report it and start fresh.
            if current.replace(Vec::new()).is_some() {
                report.push(ParsedItem::Skipped(SkipReason::Unterminated));
            }
            continue;
        }

        if line.eq_ignore_ascii_case("END:VEVENT") {
            if let Some(props) = current.take() {
                report.push(build_event(&props, options));
            }
            continue;
        }

        if let Some(props) = current.as_mut() {
            if let Some(property) = Property::parse(line) {
                props.push(property);
            }
        }
    }

    if current.is_some() {
        report.push(ParsedItem::Skipped(SkipReason::Unterminated));
    }

    Ok(report)
}

/// One content line split into name, parameters, and value.
struct Property {
    name: String,
    params: Vec<(String, String)>,
    value: String,
}

impl Property {
    /// Split `NAME;PARAM=V;PARAM2=V2:value`, honoring quoted parameter
    /// values that may themselves contain `:` or `;`.
    fn parse(line: &str) -> Option<Self> {
        let mut in_quotes = false;
        let mut colon = None;
        for (idx, ch) in line.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ':' if !in_quotes => {
                    colon = Some(idx);
                    break;
                }
                _ => {}
            }
        }

        let colon = colon?;
        let (head, value) = (&line[..colon], &line[colon + 1..]);
        let mut segments = head.split(';');
        let name = segments.next()?.trim().to_ascii_uppercase();
        if name.is_empty() {
            return None;
        }

        let params = segments
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=')?;
                Some((key.trim().to_ascii_uppercase(), value.trim_matches('"').to_string()))
            })
            .collect();

        Some(Self { name, params, value: value.to_string() })
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn find<'a>(props: &'a [Property], name: &str) -> Option<&'a Property> {
    props.iter().find(|p| p.name == name)
}

fn build_event(props: &[Property], options: &ParseOptions) -> ParsedItem {
    let Some(uid) = find(props, "UID").map(|p| p.value.trim().to_string()).filter(|v| !v.is_empty())
    else {
        return ParsedItem::Skipped(SkipReason::MissingUid);
    };

    let Some(dtstart) = find(props, "DTSTART") else {
        return ParsedItem::Skipped(SkipReason::MissingStart);
    };

    let (start, all_day) = match parse_timestamp(dtstart) {
        Ok(parsed) => parsed,
        Err(reason) => return ParsedItem::Skipped(reason),
    };

    let end = match find(props, "DTEND") {
        Some(dtend) => match parse_timestamp(dtend) {
            Ok((end, _)) => end,
            Err(reason) => return ParsedItem::Skipped(reason),
        },
        None => {
            let (duration, field, raw) = match find(props, "DURATION") {
                Some(p) => {
                    let raw = p.value.trim().to_string();
                    match parse_duration(&raw) {
                        Some(duration) => (duration, p.name.clone(), raw),
                        None => {
                            return ParsedItem::Skipped(SkipReason::BadTimestamp {
                                field: p.name.clone(),
                                value: raw,
                            })
                        }
                    }
                }
                None if all_day => (
                    options.default_all_day_duration,
                    dtstart.name.clone(),
                    dtstart.value.trim().to_string(),
                ),
                None => (
                    options.default_event_duration,
                    dtstart.name.clone(),
                    dtstart.value.trim().to_string(),
                ),
            };
            // A duration can be in range while start + duration is not.
            match start.checked_add_signed(duration) {
                Some(end) => end,
                None => return ParsedItem::Skipped(SkipReason::BadTimestamp { field, value: raw }),
            }
        }
    };

    if let Some(horizon) = options.horizon {
        if end < horizon {
            return ParsedItem::Skipped(SkipReason::InPast);
        }
    }

    let title = find(props, "SUMMARY")
        .map(|p| unescape_text(p.value.trim()))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "Booked".to_string());
    let description =
        find(props, "DESCRIPTION").map(|p| unescape_text(p.value.trim())).filter(|v| !v.is_empty());
    let location =
        find(props, "LOCATION").map(|p| unescape_text(p.value.trim())).filter(|v| !v.is_empty());

    ParsedItem::Parsed(CalendarEvent::new(uid, title, description, location, start, end, all_day))
}

/// Parse a `DTSTART`/`DTEND` property into a UTC instant.
///
/// Returns the instant plus whether the value was a whole-day `DATE`.
/// Supported forms, per RFC 5545:
/// - `VALUE=DATE` / bare 8-digit dates -> midnight UTC, all-day
/// - `...Z` suffixed date-times -> UTC
/// - `TZID=<zone>` qualified local date-times -> converted through chrono-tz
/// - floating local date-times -> treated as UTC
fn parse_timestamp(prop: &Property) -> Result<(DateTime<Utc>, bool), SkipReason> {
    let value = prop.value.trim();
    let bad = || SkipReason::BadTimestamp {
        field: prop.name.clone(),
        value: value.to_string(),
    };

    let is_date = prop.param("VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()));

    if is_date {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| bad())?;
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(bad)?;
        return Ok((midnight.and_utc(), true));
    }

    if let Some(stripped) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(stripped, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
        return Ok((naive.and_utc(), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| bad())?;

    if let Some(tzid) = prop.param("TZID") {
        let tz = Tz::from_str(tzid).map_err(|_| bad())?;
        let local = tz.from_local_datetime(&naive).earliest().ok_or_else(bad)?;
        return Ok((local.with_timezone(&Utc), false));
    }

    // Floating local time; normalize to UTC by policy.
    Ok((naive.and_utc(), false))
}

/// Parse the subset of RFC 5545 durations feeds actually emit
/// (`P2D`, `PT1H30M`, `P1DT12H`, ...). Returns `None` for anything else,
/// including values outside the representable duration range.
fn parse_duration(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let rest = rest.strip_prefix('P')?;

    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, t),
        None => (rest, ""),
    };

    let mut total = Duration::zero();
    let mut number = String::new();

    for ch in date_part.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
        } else {
            let amount: i64 = number.parse().ok()?;
            number.clear();
            let step = match ch {
                'W' => Duration::try_weeks(amount),
                'D' => Duration::try_days(amount),
                _ => return None,
            }?;
            total = total.checked_add(&step)?;
        }
    }
    if !number.is_empty() {
        return None;
    }

    for ch in time_part.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
        } else {
            let amount: i64 = number.parse().ok()?;
            number.clear();
            let step = match ch {
                'H' => Duration::try_hours(amount),
                'M' => Duration::try_minutes(amount),
                'S' => Duration::try_seconds(amount),
                _ => return None,
            }?;
            total = total.checked_add(&step)?;
        }
    }
    if !number.is_empty() {
        return None;
    }

    Some(if negative { -total } else { total })
}

/// RFC 5545 line unfolding: a line starting with a space or tab continues the
/// previous line.
fn unfold_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(continuation) = raw.strip_prefix(|c: char| c == ' ' || c == '\t') {
            if let Some(last) = lines.last_mut() {
                last.push_str(continuation);
                continue;
            }
        }
        if !raw.is_empty() {
            lines.push(raw.to_string());
        }
    }

    lines
}

/// RFC 5545 text unescaping for SUMMARY/DESCRIPTION/LOCATION values.
fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => result.push('\n'),
            Some(escaped @ (',' | ';' | '\\')) => result.push(escaped),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(events: &str) -> Vec<u8> {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Airbnb Inc//Hosting Calendar 1.0//EN\r\n{events}END:VCALENDAR\r\n"
        )
        .into_bytes()
    }

    #[test]
    fn parses_basic_event() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:abc-123@airbnb.com\r\nDTSTART:20240601T120000Z\r\nDTEND:20240603T100000Z\r\nSUMMARY:Reserved\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();

        assert_eq!(report.events.len(), 1);
        assert!(report.skipped.is_empty());

        let event = &report.events[0];
        assert_eq!(event.uid, "abc-123@airbnb.com");
        assert_eq!(event.title, "Reserved");
        assert!(!event.all_day);
        assert_eq!(event.start.to_rfc3339(), "2024-06-01T12:00:00+00:00");
        assert_eq!(event.end.to_rfc3339(), "2024-06-03T10:00:00+00:00");
    }

    #[test]
    fn parses_all_day_date_values() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART;VALUE=DATE:20240601\r\nDTEND;VALUE=DATE:20240603\r\nSUMMARY:Blocked\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();

        let event = &report.events[0];
        assert!(event.all_day);
        assert_eq!(event.start.to_rfc3339(), "2024-06-01T00:00:00+00:00");
        assert_eq!(event.end.to_rfc3339(), "2024-06-03T00:00:00+00:00");
    }

    #[test]
    fn normalizes_tzid_to_utc() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART;TZID=America/Vancouver:20240601T090000\r\nDTEND;TZID=America/Vancouver:20240601T110000\r\nSUMMARY:Check-in\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();

        let event = &report.events[0];
        // PDT is UTC-7 in June.
        assert_eq!(event.start.to_rfc3339(), "2024-06-01T16:00:00+00:00");
        assert_eq!(event.end.to_rfc3339(), "2024-06-01T18:00:00+00:00");
    }

    #[test]
    fn missing_end_gets_default_duration() {
        let options = ParseOptions::default();
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:timed\r\nDTSTART:20240601T120000Z\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:allday\r\nDTSTART;VALUE=DATE:20240601\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &options).unwrap();

        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[0].end - report.events[0].start, Duration::hours(1));
        assert_eq!(report.events[1].end - report.events[1].start, Duration::days(1));
    }

    #[test]
    fn duration_property_overrides_default() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240601T120000Z\r\nDURATION:P1DT12H\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(
            report.events[0].end - report.events[0].start,
            Duration::days(1) + Duration::hours(12)
        );
    }

    #[test]
    fn malformed_event_is_skipped_not_fatal() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:good\r\nDTSTART:20240601T120000Z\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nDTSTART:20240601T120000Z\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:bad-ts\r\nDTSTART:junk\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].uid, "good");
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0], SkipReason::MissingUid);
        assert!(matches!(report.skipped[1], SkipReason::BadTimestamp { .. }));
    }

    #[test]
    fn unterminated_event_is_skipped() {
        let bytes = doc("BEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240601T120000Z\r\n");
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();

        assert!(report.events.is_empty());
        assert_eq!(report.skipped, vec![SkipReason::Unterminated]);
    }

    #[test]
    fn missing_envelope_is_malformed_document() {
        let err = parse_ical(b"BEGIN:VEVENT\r\nEND:VEVENT\r\n", &ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedDocument(_)));
    }

    #[test]
    fn non_utf8_is_malformed_document() {
        let err = parse_ical(&[0xff, 0xfe, 0x00], &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::MalformedDocument(_)));
    }

    #[test]
    fn horizon_skips_past_events() {
        let options = ParseOptions {
            horizon: Some("2024-06-02T00:00:00Z".parse().unwrap()),
            ..ParseOptions::default()
        };
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:past\r\nDTSTART:20240501T120000Z\r\nDTEND:20240501T140000Z\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:future\r\nDTSTART:20240701T120000Z\r\nDTEND:20240701T140000Z\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &options).unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].uid, "future");
        assert_eq!(report.skipped, vec![SkipReason::InPast]);
    }

    #[test]
    fn folded_lines_are_unfolded() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240601T120000Z\r\nSUMMARY:Reserved for a\r\n  very long guest name\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(report.events[0].title, "Reserved for a very long guest name");
    }

    #[test]
    fn text_escapes_are_decoded() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240601T120000Z\r\nSUMMARY:Smith\\, Jane\\nLate arrival\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(report.events[0].title, "Smith, Jane\nLate arrival");
    }

    #[test]
    fn same_bytes_yield_same_fingerprints() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240601T120000Z\r\nDTEND:20240602T120000Z\r\nSUMMARY:Reserved\r\nEND:VEVENT\r\n",
        );
        let first = parse_ical(&bytes, &ParseOptions::default()).unwrap();
        let second = parse_ical(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(first.events[0].fingerprint, second.events[0].fingerprint);
    }

    #[test]
    fn property_order_does_not_change_fingerprint() {
        let a = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240601T120000Z\r\nDTEND:20240602T120000Z\r\nSUMMARY:Reserved\r\nLOCATION:Cabin 2\r\nEND:VEVENT\r\n",
        );
        let b = doc(
            "BEGIN:VEVENT\r\nLOCATION:Cabin 2\r\nSUMMARY:Reserved\r\nDTEND:20240602T120000Z\r\nDTSTART:20240601T120000Z\r\nUID:u1\r\nEND:VEVENT\r\n",
        );
        let report_a = parse_ical(&a, &ParseOptions::default()).unwrap();
        let report_b = parse_ical(&b, &ParseOptions::default()).unwrap();
        assert_eq!(report_a.events[0].fingerprint, report_b.events[0].fingerprint);
    }

    #[test]
    fn quoted_params_with_colons_are_handled() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART;X-HINT=\"tz: weird\":20240601T120000Z\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();
        assert_eq!(report.events.len(), 1);
    }

    #[test]
    fn duration_parser_handles_common_forms() {
        assert_eq!(parse_duration("P2D"), Some(Duration::days(2)));
        assert_eq!(parse_duration("PT1H30M"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("P1W"), Some(Duration::weeks(1)));
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("15M"), None);
        assert_eq!(parse_duration("P15"), None);
    }

    #[test]
    fn duration_parser_rejects_out_of_range_values() {
        assert_eq!(parse_duration("P9223372036854775807W"), None);
        assert_eq!(parse_duration("P106751991167DT24H"), None);
        assert_eq!(parse_duration("P99999999999999999999D"), None);
    }

    #[test]
    fn oversized_duration_is_skipped_not_fatal() {
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:huge\r\nDTSTART:20240601T120000Z\r\nDURATION:P9223372036854775807W\r\nEND:VEVENT\r\nBEGIN:VEVENT\r\nUID:ok\r\nDTSTART:20240601T120000Z\r\nDURATION:P2D\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].uid, "ok");
        assert!(matches!(
            report.skipped[0],
            SkipReason::BadTimestamp { ref field, .. } if field == "DURATION"
        ));
    }

    #[test]
    fn duration_past_datetime_range_is_skipped_not_fatal() {
        // The duration itself is representable but start + duration is not.
        let bytes = doc(
            "BEGIN:VEVENT\r\nUID:u1\r\nDTSTART:20240601T120000Z\r\nDURATION:P99999999999D\r\nEND:VEVENT\r\n",
        );
        let report = parse_ical(&bytes, &ParseOptions::default()).unwrap();

        assert!(report.events.is_empty());
        assert!(matches!(
            report.skipped[0],
            SkipReason::BadTimestamp { ref field, .. } if field == "DURATION"
        ));
    }
}
