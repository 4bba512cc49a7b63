use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::ForecastSummary;

const MAX_SUMMARY_DAYS: usize = 5;

/// Derive up to five daily summaries from a raw 3-hour forecast document.
///
/// Entries are grouped by the calendar-date prefix of `dt_txt` (no timezone
/// conversion); entries with an unparsable timestamp are skipped, and a day
/// with no numeric temperature readings is dropped entirely. Each day's
/// icon/description come from the near-midday entry (the one whose `dt_txt`
/// contains "12:00:00") or, failing that, the day's first entry.
pub fn five_day_summaries(forecast: &Value) -> Vec<ForecastSummary> {
    let Some(list) = forecast.get("list").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut by_date: BTreeMap<NaiveDate, Vec<&Value>> = BTreeMap::new();
    for entry in list {
        let Some(date) = entry
            .get("dt_txt")
            .and_then(Value::as_str)
            .and_then(parse_entry_date)
        else {
            continue;
        };
        by_date.entry(date).or_default().push(entry);
    }

    let mut summaries = Vec::new();
    for (date, entries) in by_date {
        let temps: Vec<f64> = entries
            .iter()
            .filter_map(|e| e.pointer("/main/temp").and_then(Value::as_f64))
            .collect();
        if temps.is_empty() {
            continue;
        }

        let temp_min = temps.iter().copied().fold(f64::INFINITY, f64::min);
        let temp_max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let representative = entries
            .iter()
            .find(|e| {
                e.get("dt_txt")
                    .and_then(Value::as_str)
                    .is_some_and(|txt| txt.contains("12:00:00"))
            })
            .copied()
            .unwrap_or(entries[0]);

        let condition = representative.pointer("/weather/0");
        let icon = condition
            .and_then(|c| c.get("icon"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let description = condition
            .and_then(|c| c.get("description"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        // Max over the entries that carry a pop; 0.0 when none do.
        let precipitation_probability = entries
            .iter()
            .filter_map(|e| e.get("pop").and_then(Value::as_f64))
            .fold(0.0_f64, f64::max);

        summaries.push(ForecastSummary {
            date,
            temp_min,
            temp_max,
            icon,
            description,
            precipitation_probability,
        });
    }

    summaries.truncate(MAX_SUMMARY_DAYS);
    summaries
}

fn parse_entry_date(dt_txt: &str) -> Option<NaiveDate> {
    let date_part = dt_txt.split_whitespace().next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(dt_txt: &str, temp: f64, icon: &str, desc: &str, pop: Option<f64>) -> Value {
        let mut e = json!({
            "dt_txt": dt_txt,
            "main": { "temp": temp },
            "weather": [{ "icon": icon, "description": desc }],
        });
        if let Some(p) = pop {
            e["pop"] = json!(p);
        }
        e
    }

    #[test]
    fn caps_summaries_at_five_days_sorted_ascending() {
        let list: Vec<Value> = (1..=7)
            .map(|day| {
                entry(
                    &format!("2026-03-0{day} 12:00:00"),
                    50.0 + day as f64,
                    "01d",
                    "clear sky",
                    None,
                )
            })
            .collect();
        let doc = json!({ "list": list });

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries.len(), 5);
        for pair in summaries.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
        assert_eq!(
            summaries[0].date,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn min_max_over_a_days_readings() {
        let doc = json!({ "list": [
            entry("2026-03-01 06:00:00", 65.0, "01d", "clear sky", None),
            entry("2026-03-01 12:00:00", 70.0, "02d", "few clouds", None),
            entry("2026-03-01 18:00:00", 60.0, "01n", "clear sky", None),
        ]});

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].temp_min, 60.0);
        assert_eq!(summaries[0].temp_max, 70.0);
    }

    #[test]
    fn representative_is_the_midday_entry() {
        let doc = json!({ "list": [
            entry("2026-03-01 09:00:00", 55.0, "10d", "light rain", None),
            entry("2026-03-01 12:00:00", 62.0, "02d", "few clouds", None),
            entry("2026-03-01 15:00:00", 58.0, "04d", "overcast clouds", None),
        ]});

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries[0].icon, "02d");
        assert_eq!(summaries[0].description, "few clouds");
    }

    #[test]
    fn falls_back_to_first_entry_without_a_midday_reading() {
        let doc = json!({ "list": [
            entry("2026-03-01 18:00:00", 55.0, "10d", "light rain", None),
            entry("2026-03-01 21:00:00", 50.0, "10n", "moderate rain", None),
        ]});

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries[0].icon, "10d");
        assert_eq!(summaries[0].description, "light rain");
    }

    #[test]
    fn precipitation_probability_is_the_group_max() {
        let doc = json!({ "list": [
            entry("2026-03-01 06:00:00", 55.0, "10d", "light rain", Some(0.2)),
            entry("2026-03-01 12:00:00", 60.0, "10d", "light rain", Some(0.85)),
            entry("2026-03-01 18:00:00", 52.0, "10d", "light rain", None),
        ]});

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries[0].precipitation_probability, 0.85);
    }

    #[test]
    fn precipitation_probability_defaults_to_zero() {
        let doc = json!({ "list": [
            entry("2026-03-01 12:00:00", 60.0, "01d", "clear sky", None),
        ]});

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries[0].precipitation_probability, 0.0);
    }

    #[test]
    fn skips_entries_with_unparsable_timestamps() {
        let doc = json!({ "list": [
            { "dt_txt": "not a timestamp", "main": { "temp": 99.0 } },
            { "main": { "temp": 99.0 } },
            entry("2026-03-02 12:00:00", 60.0, "01d", "clear sky", None),
        ]});

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].temp_max, 60.0);
    }

    #[test]
    fn skips_days_without_numeric_temperatures() {
        let doc = json!({ "list": [
            { "dt_txt": "2026-03-01 12:00:00", "main": {} },
            { "dt_txt": "2026-03-01 15:00:00", "main": { "temp": "warm" } },
            entry("2026-03-02 12:00:00", 60.0, "01d", "clear sky", None),
        ]});

        let summaries = five_day_summaries(&doc);
        assert_eq!(summaries.len(), 1);
        assert_eq!(
            summaries[0].date,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
    }

    #[test]
    fn empty_or_malformed_documents_yield_no_summaries() {
        assert!(five_day_summaries(&json!({})).is_empty());
        assert!(five_day_summaries(&json!({ "list": [] })).is_empty());
        assert!(five_day_summaries(&json!("nope")).is_empty());
    }
}
