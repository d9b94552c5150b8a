extern crate anyhow;
extern crate reqwest;
extern crate serde;
extern crate serde_json;
extern crate serde_with;

use anyhow::Context;
use crate::result;
use crate::structs;
use serde_with::{serde_as, DefaultOnError};

pub const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);
const USER_AGENT: &str = concat!("oebbdash/", env!("CARGO_PKG_VERSION"));

// Only these remark codes make it onto the info bar.
const INFO_CODES: [&str; 3] = ["FK", "OB", "RO"];
const INFO_LINE_LIMIT: usize = 50;
const INFO_SEPARATOR: &str = " | ";

// "2025-05-26T10:16:00+02:00"
//             ^^^^^ bytes 11..16
const MIN_TIMESTAMP_LEN: usize = 19;

pub type FetchFn = fn(&str) -> result::DashResult<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOptions {
    pub platform_filter: String,
    pub max_matches: usize,
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        return ParseOptions {
            platform_filter: String::new(),
            max_matches: 1,
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseReport {
    Parsed { available: usize, written: usize },
    MissingDepartures,
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimeField {
    Time(String),
    Missing,
    Malformed(String),
}

impl TimeField {
    pub fn or(self, fallback: &str) -> String {
        match self {
            TimeField::Time(hhmm) => hhmm,
            _ => fallback.to_string(),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Default)]
struct OebbResponse {
    #[serde_as(as = "DefaultOnError<Option<Vec<DefaultOnError>>>")]
    #[serde(default)]
    departures: Option<Vec<OebbDeparture>>,
}

#[serde_as]
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct OebbDeparture {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    line: Option<OebbLine>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    direction: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    platform: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    planned_when: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    when: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    delay: Option<f64>,

    #[serde_as(as = "DefaultOnError<Vec<DefaultOnError>>")]
    #[serde(default)]
    remarks: Vec<OebbRemark>,
}

#[serde_as]
#[derive(Deserialize, Debug, Default)]
struct OebbLine {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    name: Option<String>,
}

#[serde_as]
#[derive(Deserialize, Debug, Default)]
struct OebbRemark {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    code: Option<String>,

    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    text: Option<String>,
}

pub fn departures_url(base_url: &str, station_id: &str) -> result::DashResult<String> {
    let url = reqwest::Url::parse_with_params(base_url, &[("stationID", station_id)])
        .with_context(|| format!("bad api url '{}'", base_url))?;
    return Ok(url.to_string());
}

/// One request, no retries. Empty string on any failure.
pub fn fetch_departures(base_url: &str, station_id: &str, fetch_fn: FetchFn) -> String {
    let url = match departures_url(base_url, station_id) {
        Ok(url) => url,
        Err(err) => {
            error!("{}", err);
            return String::new();
        }
    };

    info!("Fetching {}", url);
    match fetch_fn(&url) {
        Ok(body) => {
            info!("Payload length: {}", body.len());
            if !body.is_empty() {
                debug!("Payload start: {}", preview(&body));
            }
            return body;
        },
        Err(err) => {
            warn!("Fetch failed: {}", err);
            return String::new();
        },
    }
}

pub fn real_fetch(url: &str) -> result::DashResult<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let response = client.get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .with_context(|| format!("while fetching url: {}", url))?;

    let status = response.status();
    info!("HTTP status {}", status.as_u16());
    let body = response.text().context("while reading response body")?;

    if status != reqwest::StatusCode::OK {
        if !body.is_empty() {
            warn!("Error response: {}", preview(&body));
        }
        return Err(result::make_error(&format!("HTTP status {}", status)));
    }

    return Ok(body);
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Fills slots 0.. in source order. Writes nothing if the payload is unusable;
/// the returned report is for the log only.
pub fn parse_departures(json: &str, options: &ParseOptions, slots: &mut structs::Slots) -> ParseReport {
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(err) => {
            warn!("JSON parse error: {}", err);
            return ParseReport::Malformed(err.to_string());
        }
    };

    // Only a top-level object can carry "departures".
    if !value.is_object() {
        warn!("No 'departures' in JSON");
        return ParseReport::MissingDepartures;
    }

    let response: OebbResponse = match serde_json::from_value(value) {
        Ok(response) => response,
        Err(err) => {
            warn!("JSON shape error: {}", err);
            return ParseReport::Malformed(err.to_string());
        }
    };

    let departures = match response.departures {
        Some(departures) => departures,
        None => {
            warn!("No 'departures' in JSON");
            return ParseReport::MissingDepartures;
        }
    };
    debug!("{} departures in response", departures.len());

    let limit = std::cmp::min(std::cmp::max(options.max_matches, 1), structs::SLOT_COUNT);
    let filter = options.platform_filter.as_str();

    let mut written = 0;
    for dep in &departures {
        if written >= limit {
            break;
        }

        if !filter.is_empty() && dep.platform.as_deref().unwrap_or("") != filter {
            continue;
        }

        let record = &mut slots[written];
        fill_record(record, dep);
        info!("Departure {}: {} -> {} at {} platform {}",
              written, record.train_label(), record.destination,
              record.scheduled_time, record.platform);
        written += 1;
    }

    return ParseReport::Parsed {
        available: departures.len(),
        written: written,
    };
}

fn fill_record(record: &mut structs::DepartureRecord, dep: &OebbDeparture) {
    let line_name = dep.line.as_ref()
        .and_then(|l| l.name.as_deref())
        .unwrap_or(structs::UNKNOWN_LINE);
    let (train_type, train_name) = split_line_name(line_name);
    record.train_type = train_type;
    record.train_name = train_name;

    record.destination = dep.direction.clone()
        .unwrap_or_else(|| structs::UNKNOWN_DESTINATION.to_string());
    record.platform = dep.platform.clone().unwrap_or_default();

    record.scheduled_time = extract_clock_time(dep.planned_when.as_deref()).or(structs::NO_TIME);
    let estimated_time = extract_clock_time(dep.when.as_deref());
    if let TimeField::Malformed(ref raw) = estimated_time {
        debug!("Unusable 'when' timestamp '{}'", raw);
    }
    record.estimated_time = estimated_time.or(&record.scheduled_time);

    match dep.delay {
        Some(delay) => {
            let delay_seconds = delay.trunc() as i64;
            record.is_delayed = delay_seconds > 0;
            record.delay_minutes = delay_seconds / 60;
        },
        None => {
            record.is_delayed = record.estimated_time != record.scheduled_time;
            record.delay_minutes = 0;
        },
    }

    record.info_line = build_info_line(&dep.remarks);

    record.valid = true;
    record.scroll_offset = 0;
    record.needs_scrolling = false;
}

pub fn extract_clock_time(raw: Option<&str>) -> TimeField {
    let raw = match raw {
        Some(raw) => raw,
        None => return TimeField::Missing,
    };

    if raw.len() < MIN_TIMESTAMP_LEN {
        return TimeField::Malformed(raw.to_string());
    }

    match raw.get(11..16) {
        Some(hhmm) => TimeField::Time(hhmm.to_string()),
        None => TimeField::Malformed(raw.to_string()),
    }
}

/// "R 53 (Zug-Nr. 3210)" -> ("R", "53")
pub fn split_line_name(line_name: &str) -> (String, String) {
    let name = match line_name.find(" (") {
        Some(pos) if pos > 0 => &line_name[..pos],
        _ => line_name,
    };

    match name.find(' ') {
        Some(pos) if pos > 0 => (name[..pos].to_string(), name[pos + 1..].to_string()),
        _ => (name.to_string(), String::new()),
    }
}

fn build_info_line(remarks: &[OebbRemark]) -> String {
    let mut info_line = String::new();
    for remark in remarks {
        let code = remark.code.as_deref().unwrap_or("");
        if !INFO_CODES.contains(&code) {
            continue;
        }

        if !info_line.is_empty() {
            info_line.push_str(INFO_SEPARATOR);
        }
        info_line.push_str(remark.text.as_deref().unwrap_or(""));

        if info_line.chars().count() > INFO_LINE_LIMIT {
            break;
        }
    }
    return info_line;
}

#[cfg(test)]
mod tests {
    extern crate proptest;
    extern crate serde_json;

    use super::{ParseOptions, ParseReport, TimeField};
    use crate::result;
    use crate::structs;
    use proptest::prelude::*;

    fn golden_json() -> String {
        return std::fs::read_to_string("testdata/oebb_departures.json")
            .expect("Error reading oebb_departures.json");
    }

    fn parse(json: &str, options: &ParseOptions) -> (structs::Slots, ParseReport) {
        let mut slots = structs::empty_slots();
        let report = super::parse_departures(json, options, &mut slots);
        return (slots, report);
    }

    fn filter(platform: &str) -> ParseOptions {
        return ParseOptions {
            platform_filter: platform.to_string(),
            ..ParseOptions::default()
        };
    }

    #[test]
    fn parse_golden_first_departure() {
        let (slots, report) = parse(&golden_json(), &ParseOptions::default());

        assert_eq!(ParseReport::Parsed { available: 3, written: 1 }, report);

        let first = &slots[0];
        assert!(first.valid);
        assert_eq!("R", first.train_type);
        assert_eq!("53", first.train_name);
        assert_eq!("Attnang-Puchheim Bahnhof", first.destination);
        assert_eq!("10:16", first.scheduled_time);
        assert_eq!("10:18", first.estimated_time);
        assert_eq!("1", first.platform);
        assert!(first.is_delayed);
        assert_eq!(2, first.delay_minutes);
        assert_eq!("Fahrradmitnahme reservierungspflichtig | Zug hält nicht in Pinsdorf",
                   first.info_line);
        assert_eq!(0, first.scroll_offset);

        assert!(!slots[1].valid);
    }

    #[test]
    fn at_most_one_record_by_default() {
        let (slots, _) = parse(&golden_json(), &ParseOptions::default());
        assert_eq!(1, structs::valid_count(&slots));

        let (slots, _) = parse(&golden_json(), &filter("3"));
        assert_eq!(1, structs::valid_count(&slots));
    }

    #[test]
    fn two_slots_when_asked() {
        let options = ParseOptions {
            platform_filter: "3".to_string(),
            max_matches: 2,
        };
        let (slots, report) = parse(&golden_json(), &options);

        assert_eq!(ParseReport::Parsed { available: 3, written: 2 }, report);
        assert_eq!("REX", slots[0].train_type);
        assert_eq!("S", slots[1].train_type);
        assert_eq!("1", slots[1].train_name);
    }

    #[test]
    fn max_matches_is_clamped_to_slot_count() {
        let options = ParseOptions {
            platform_filter: String::new(),
            max_matches: 10,
        };
        let (slots, report) = parse(&golden_json(), &options);
        assert_eq!(ParseReport::Parsed { available: 3, written: 2 }, report);
        assert_eq!(2, structs::valid_count(&slots));
    }

    #[test]
    fn platform_filter_takes_first_match_and_stops() {
        let json = r#"{"departures": [
            {"line": {"name": "R 1"}, "platform": "1"},
            {"line": {"name": "R 2"}, "platform": "3"},
            {"line": {"name": "R 3"}, "platform": "3"}
        ]}"#;
        let (slots, report) = parse(json, &filter("3"));

        assert_eq!(ParseReport::Parsed { available: 3, written: 1 }, report);
        assert!(slots[0].valid);
        assert_eq!("2", slots[0].train_name);
        assert!(!slots[1].valid);
    }

    #[test]
    fn platform_filter_without_match() {
        let (slots, report) = parse(&golden_json(), &filter("7"));
        assert_eq!(ParseReport::Parsed { available: 3, written: 0 }, report);
        assert_eq!(0, structs::valid_count(&slots));
    }

    #[test]
    fn estimate_without_delay_field() {
        let (slots, _) = parse(&golden_json(), &filter("3"));
        let rex = &slots[0];
        assert_eq!("REX", rex.train_type);
        assert_eq!("5", rex.train_name);
        assert_eq!("10:30", rex.scheduled_time);
        // "when" is null, so the plan is all we know.
        assert_eq!("10:30", rex.estimated_time);
        assert!(!rex.is_delayed);
        assert_eq!(0, rex.delay_minutes);
        assert_eq!("", rex.info_line);
    }

    #[test]
    fn delay_in_seconds() {
        let json = r#"{"departures": [{"plannedWhen": "2025-05-26T10:16:00+02:00",
                                       "when": "2025-05-26T10:18:05+02:00",
                                       "delay": 125}]}"#;
        let (slots, _) = parse(json, &ParseOptions::default());
        assert!(slots[0].is_delayed);
        assert_eq!(2, slots[0].delay_minutes);
    }

    #[test]
    fn early_departure_is_not_delayed() {
        let json = r#"{"departures": [{"delay": -60}]}"#;
        let (slots, _) = parse(json, &ParseOptions::default());
        assert!(!slots[0].is_delayed);
        assert_eq!(-1, slots[0].delay_minutes);
    }

    #[test]
    fn delay_inferred_from_times() {
        let same = r#"{"departures": [{"plannedWhen": "2025-05-26T10:16:00+02:00",
                                       "when": "2025-05-26T10:16:00+02:00"}]}"#;
        let (slots, _) = parse(same, &ParseOptions::default());
        assert!(!slots[0].is_delayed);

        let different = r#"{"departures": [{"plannedWhen": "2025-05-26T10:16:00+02:00",
                                            "when": "2025-05-26T10:21:00+02:00",
                                            "delay": null}]}"#;
        let (slots, _) = parse(different, &ParseOptions::default());
        assert!(slots[0].is_delayed);
        assert_eq!(0, slots[0].delay_minutes);
    }

    #[test]
    fn line_names() {
        assert_eq!(("R".to_string(), "53".to_string()),
                   super::split_line_name("R 53 (Zug-Nr. 3210)"));
        assert_eq!(("RJX".to_string(), "768".to_string()),
                   super::split_line_name("RJX 768"));
        assert_eq!(("WB".to_string(), "".to_string()),
                   super::split_line_name("WB"));
        assert_eq!(("S".to_string(), "1 Richtung".to_string()),
                   super::split_line_name("S 1 Richtung"));
    }

    #[test]
    fn remarks_are_filtered_by_code() {
        let json = r#"{"departures": [{"remarks": [
            {"code": "FK", "text": "A"},
            {"code": "XX", "text": "B"},
            {"code": "OB", "text": "C"}
        ]}]}"#;
        let (slots, _) = parse(json, &ParseOptions::default());
        assert_eq!("A | C", slots[0].info_line);
    }

    #[test]
    fn info_line_stops_after_limit() {
        let thirty = "x".repeat(30);
        let json = serde_json::json!({"departures": [{"remarks": [
            {"code": "FK", "text": thirty},
            {"code": "RO", "text": thirty},
            {"code": "OB", "text": "never shown"},
        ]}]}).to_string();
        let (slots, _) = parse(&json, &ParseOptions::default());
        assert_eq!(format!("{} | {}", thirty, thirty), slots[0].info_line);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let (slots, _) = parse(r#"{"departures": [{}]}"#, &ParseOptions::default());
        let record = &slots[0];
        assert!(record.valid);
        assert_eq!("???", record.train_type);
        assert_eq!("", record.train_name);
        assert_eq!("Unbekannt", record.destination);
        assert_eq!("--:--", record.scheduled_time);
        assert_eq!("--:--", record.estimated_time);
        assert_eq!("", record.platform);
        assert!(!record.is_delayed);
    }

    #[test]
    fn mistyped_fields_count_as_missing() {
        let json = r#"{"departures": [{"line": {"name": 53}, "direction": 7,
                                       "delay": "late", "remarks": ["FK", {"code": "FK", "text": "ok"}]}]}"#;
        let (slots, _) = parse(json, &ParseOptions::default());
        let record = &slots[0];
        assert_eq!("???", record.train_type);
        assert_eq!("Unbekannt", record.destination);
        assert!(!record.is_delayed);
        assert_eq!("ok", record.info_line);
    }

    #[test]
    fn malformed_json_leaves_slots_alone() {
        let (slots, report) = parse("{\"departures\": [", &ParseOptions::default());
        match report {
            ParseReport::Malformed(_) => {},
            other => panic!("unexpected report {:?}", other),
        }
        assert_eq!(0, structs::valid_count(&slots));
    }

    #[test]
    fn missing_departures_array() {
        let (slots, report) = parse(r#"{"error": "station unknown"}"#, &ParseOptions::default());
        assert_eq!(ParseReport::MissingDepartures, report);
        assert_eq!(0, structs::valid_count(&slots));

        let (_, report) = parse(r#"{"departures": "none"}"#, &ParseOptions::default());
        assert_eq!(ParseReport::MissingDepartures, report);
    }

    #[test]
    fn top_level_array_has_no_departures() {
        let (slots, report) = parse(r#"[[{"line":{"name":"R 1"}}]]"#, &ParseOptions::default());
        assert_eq!(ParseReport::MissingDepartures, report);
        assert_eq!(0, structs::valid_count(&slots));

        let (slots, report) = parse(r#""departures""#, &ParseOptions::default());
        assert_eq!(ParseReport::MissingDepartures, report);
        assert_eq!(0, structs::valid_count(&slots));
    }

    #[test]
    fn syntax_error_inside_departures_is_malformed() {
        let (slots, report) = parse(r#"{"departures": [1,2,}"#, &ParseOptions::default());
        match report {
            ParseReport::Malformed(_) => {},
            other => panic!("unexpected report {:?}", other),
        }
        assert_eq!(0, structs::valid_count(&slots));
    }

    #[test]
    fn fractional_delay_is_truncated() {
        let json = r#"{"departures": [{"delay": 120.0}, {"delay": 59.9}]}"#;
        let options = ParseOptions {
            platform_filter: String::new(),
            max_matches: 2,
        };
        let (slots, _) = parse(json, &options);
        assert!(slots[0].is_delayed);
        assert_eq!(2, slots[0].delay_minutes);
        assert!(slots[1].is_delayed);
        assert_eq!(0, slots[1].delay_minutes);
    }

    #[test]
    fn reparse_resets_scroll_state() {
        let mut slots = structs::empty_slots();
        slots[0].scroll_offset = 42;
        slots[0].needs_scrolling = true;
        super::parse_departures(&golden_json(), &ParseOptions::default(), &mut slots);
        assert_eq!(0, slots[0].scroll_offset);
        assert!(!slots[0].needs_scrolling);
    }

    #[test]
    fn clock_time_variants() {
        assert_eq!(TimeField::Missing, super::extract_clock_time(None));
        assert_eq!(TimeField::Malformed("10:16".to_string()),
                   super::extract_clock_time(Some("10:16")));
        assert_eq!(TimeField::Time("10:16".to_string()),
                   super::extract_clock_time(Some("2025-05-26T10:16:00")));
    }

    #[test]
    fn url_carries_station() {
        assert_eq!("http://168.119.111.217:3000/oebb-departures?stationID=8100151",
                   super::departures_url("http://168.119.111.217:3000/oebb-departures", "8100151")
                   .expect("departures_url"));
        assert!(super::departures_url("not a url", "1").is_err());
    }

    #[test]
    fn fetch_returns_body() {
        let fake_fetch_fn = |url: &str| -> result::DashResult<String> {
            assert!(url.ends_with("?stationID=8100151"));
            return Ok("{\"departures\": []}".to_string());
        };
        assert_eq!("{\"departures\": []}",
                   super::fetch_departures("http://example.invalid/dep", "8100151", fake_fetch_fn));
    }

    #[test]
    fn fetch_failure_is_empty() {
        let failing_fetch_fn = |_url: &str| -> result::DashResult<String> {
            return Err(result::make_error("HTTP status 503 Service Unavailable"));
        };
        assert_eq!("", super::fetch_departures("http://example.invalid/dep", "8100151", failing_fetch_fn));
        assert_eq!("", super::fetch_departures("::", "8100151", failing_fetch_fn));
    }

    proptest! {
        #[test]
        fn scheduled_time_is_sliced_from_long_timestamps(ts in "[0-9T:+-]{19,32}") {
            let json = serde_json::json!({"departures": [{"plannedWhen": ts}]}).to_string();
            let (slots, _) = parse(&json, &ParseOptions::default());
            prop_assert_eq!(&ts[11..16], slots[0].scheduled_time.as_str());
        }

        #[test]
        fn short_timestamps_show_placeholder(ts in "[0-9T:+-]{0,18}") {
            let json = serde_json::json!({"departures": [{"plannedWhen": ts}]}).to_string();
            let (slots, _) = parse(&json, &ParseOptions::default());
            prop_assert_eq!("--:--", slots[0].scheduled_time.as_str());
        }

        #[test]
        fn never_more_than_one_valid_record(platforms in proptest::collection::vec("[1-4]", 0..6)) {
            let departures: Vec<serde_json::Value> = platforms.iter()
                .map(|p| serde_json::json!({"platform": p}))
                .collect();
            let json = serde_json::json!({"departures": departures}).to_string();
            let (slots, _) = parse(&json, &ParseOptions::default());
            prop_assert!(structs::valid_count(&slots) <= 1);
            let (slots, _) = parse(&json, &filter("3"));
            prop_assert!(structs::valid_count(&slots) <= 1);
        }
    }
}
