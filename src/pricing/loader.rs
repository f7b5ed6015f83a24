//! Pricing source ingestion.
//!
//! Sources are local files or http(s) URLs; the format is sniffed from the
//! extension (`.json` or `.csv`). The JSON source of truth is accepted both
//! as an array of row objects and as an object keyed by postal code, and a
//! set of header synonyms is normalized to the canonical fields. Defective
//! rows are skipped one at a time; only a totally unusable source fails
//! the load.

use serde_json::Value;
use tracing::debug;

use super::{PricingEntry, PricingError, PricingTable};

/// Canonical row fields after header normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Zip,
    Minimum,
    Fee,
    Lead,
    LastCall,
    Window,
}

/// Load and parse a pricing source into a fresh table.
///
/// Any returned error means the table should be considered empty; row-level
/// defects are skipped silently (logged at debug) and never fail the load.
pub async fn load(source: &str, client: &reqwest::Client) -> Result<PricingTable, PricingError> {
    let format = sniff_format(source)?;

    let raw = if source.starts_with("http://") || source.starts_with("https://") {
        let response = client
            .get(source)
            .send()
            .await
            .map_err(|e| PricingError::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PricingError::Fetch(format!(
                "{} returned {}",
                source,
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| PricingError::Fetch(e.to_string()))?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| PricingError::Io(e.to_string()))?
    };

    let entries = match format {
        Format::Json => parse_json(&raw)?,
        Format::Csv => parse_csv(&raw)?,
    };

    debug!(rows = entries.len(), source, "pricing table parsed");
    Ok(PricingTable::from_entries(entries))
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Json,
    Csv,
}

/// Decide the format from the source's extension, ignoring any query string.
fn sniff_format(source: &str) -> Result<Format, PricingError> {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let lower = path.to_lowercase();
    if lower.ends_with(".json") {
        Ok(Format::Json)
    } else if lower.ends_with(".csv") {
        Ok(Format::Csv)
    } else {
        Err(PricingError::UnsupportedFormat(source.to_string()))
    }
}

/// Normalize a header: lowercase with spaces, underscores, and dashes
/// removed, then match against the synonym sets.
fn canon_field(header: &str) -> Option<Field> {
    let key: String = header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect::<String>()
        .to_lowercase();

    match key.as_str() {
        "zip" | "zipcode" | "postal" | "postalcode" | "code" | "zone" => Some(Field::Zip),
        "min" | "minimum" | "minorder" | "minimumorder" | "ordermin" | "orderminimum"
        | "minimumorderamount" => Some(Field::Minimum),
        "fee" | "deliveryfee" | "charge" | "deliverycharge" => Some(Field::Fee),
        "lead" | "leadmin" | "leadminutes" | "leadtime" | "leadtimeminutes" | "eta"
        | "etaminutes" => Some(Field::Lead),
        "lastcall" | "cutoff" | "lastcallcutoff" | "cutoffminutes" | "lastcallminutes" => {
            Some(Field::LastCall)
        }
        "window" | "etawindow" | "deliverywindow" => Some(Field::Window),
        _ => None,
    }
}

/// Parse the JSON source of truth: either an array of row objects or an
/// object keyed by postal code.
fn parse_json(raw: &str) -> Result<Vec<PricingEntry>, PricingError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| PricingError::Parse(e.to_string()))?;

    match value {
        Value::Array(rows) => Ok(rows
            .iter()
            .filter_map(|row| row.as_object().and_then(|map| build_entry(map, None)))
            .collect()),
        Value::Object(map) if map.values().all(Value::is_object) && !map.is_empty() => Ok(map
            .iter()
            .filter_map(|(zip, row)| {
                row.as_object()
                    .and_then(|fields| build_entry(fields, Some(zip)))
            })
            .collect()),
        other => Err(PricingError::Parse(format!(
            "expected array of rows or object keyed by zip, got {}",
            type_name(&other)
        ))),
    }
}

/// Parse the CSV rendition via the `csv` crate, reusing the JSON row logic
/// by lifting each record into a string map.
fn parse_csv(raw: &str) -> Result<Vec<PricingEntry>, PricingError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| PricingError::Parse(e.to_string()))?
        .clone();

    let mut entries = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else {
            debug!("skipping unreadable csv record");
            continue;
        };
        let mut map = serde_json::Map::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            map.insert(header.to_string(), Value::String(value.to_string()));
        }
        if let Some(entry) = build_entry(&map, None) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Build one entry from a row map, or None if the row is defective.
fn build_entry(
    map: &serde_json::Map<String, Value>,
    fallback_zip: Option<&str>,
) -> Option<PricingEntry> {
    let mut zip = fallback_zip.map(|z| z.to_string());
    let mut minimum = None;
    let mut fee = None;
    let mut lead_minutes = None;
    let mut last_call_minutes = None;
    let mut eta_window = None;

    for (header, value) in map {
        match canon_field(header) {
            Some(Field::Zip) => zip = value_as_string(value),
            Some(Field::Minimum) => minimum = value_as_money(value),
            Some(Field::Fee) => fee = value_as_money(value),
            Some(Field::Lead) => {
                // "eta" carries either lead minutes or a spoken window
                match value_as_number(value) {
                    Some(n) => lead_minutes = Some(n),
                    None => {
                        if let Some(text) = value_as_string(value).filter(|t| !t.is_empty()) {
                            eta_window = Some(text);
                        }
                    }
                }
            }
            Some(Field::LastCall) => last_call_minutes = value_as_number(value),
            Some(Field::Window) => {
                eta_window = value_as_string(value).filter(|t| !t.is_empty());
            }
            None => {}
        }
    }

    let cleaned: String = zip
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if cleaned.len() != 5 {
        debug!(zip = %cleaned, "skipping row with bad postal code");
        return None;
    }

    let (Some(minimum), Some(fee)) = (minimum, fee) else {
        debug!(zip = %cleaned, "skipping row with unparseable minimum or fee");
        return None;
    };

    Some(PricingEntry {
        postal_code: cleaned,
        minimum,
        fee,
        eta_window,
        lead_minutes,
        last_call_minutes,
    })
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a finite, non-negative number from a JSON number or a numeric
/// string (tolerating "$" and thousands separators).
fn value_as_money(value: &Value) -> Option<f64> {
    value_as_number(value).filter(|n| *n >= 0.0)
}

fn value_as_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_format() {
        assert!(matches!(sniff_format("zones.json"), Ok(Format::Json)));
        assert!(matches!(sniff_format("ZONES.CSV"), Ok(Format::Csv)));
        assert!(matches!(
            sniff_format("https://cdn.example.net/zones.json?v=3"),
            Ok(Format::Json)
        ));
        assert!(matches!(
            sniff_format("zones.xlsx"),
            Err(PricingError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parse_json_array() {
        let entries =
            parse_json(r#"[{"zip":"95816","min":40,"fee":1.99,"lead_minutes":20}]"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].postal_code, "95816");
        assert_eq!(entries[0].minimum, 40.0);
        assert_eq!(entries[0].fee, 1.99);
        assert_eq!(entries[0].lead_minutes, Some(20.0));
    }

    #[test]
    fn test_parse_json_keyed_object() {
        let entries = parse_json(
            r#"{"95816":{"minimum":40,"fee":1.99},"95817":{"minimum":50,"fee":2.99}}"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.postal_code == "95817"));
    }

    #[test]
    fn test_header_synonyms_normalized() {
        let entries = parse_json(
            r#"[{"Zip Code":"95816","Minimum Order":"$40","Delivery Fee":"1.99","ETA":45}]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].minimum, 40.0);
        assert_eq!(entries[0].lead_minutes, Some(45.0));
    }

    #[test]
    fn test_eta_string_becomes_window() {
        let entries =
            parse_json(r#"[{"zip":"95816","min":40,"fee":1.99,"eta":"45 to 90 minutes"}]"#)
                .unwrap();
        assert_eq!(entries[0].eta_window.as_deref(), Some("45 to 90 minutes"));
        assert_eq!(entries[0].lead_minutes, None);
    }

    #[test]
    fn test_bad_rows_skipped_not_fatal() {
        let entries = parse_json(
            r#"[
                {"zip":"95816","min":40,"fee":1.99},
                {"zip":"958","min":40,"fee":1.99},
                {"zip":"95817","min":"not a number","fee":1.99},
                {"zip":"95818","min":45,"fee":2.49}
            ]"#,
        )
        .unwrap();
        let zips: Vec<_> = entries.iter().map(|e| e.postal_code.as_str()).collect();
        assert_eq!(zips, vec!["95816", "95818"]);
    }

    #[test]
    fn test_zip_cleaned_of_non_digits() {
        let entries = parse_json(r#"[{"zip":" 95-816 ","min":40,"fee":1.99}]"#).unwrap();
        assert_eq!(entries[0].postal_code, "95816");
    }

    #[test]
    fn test_negative_money_discarded() {
        let entries = parse_json(r#"[{"zip":"95816","min":-5,"fee":1.99}]"#).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_unparseable_top_level_fails() {
        assert!(matches!(
            parse_json(r#""just a string""#),
            Err(PricingError::Parse(_))
        ));
        assert!(matches!(parse_json("not json"), Err(PricingError::Parse(_))));
    }

    #[test]
    fn test_parse_csv_with_synonyms() {
        let entries = parse_csv(
            "Zip Code,Minimum Order,Delivery Fee,Lead Minutes,Last Call\n\
             95816,$40,1.99,20,60\n\
             bad,40,1.99,,\n\
             95817,50.00,2.99,120,60\n",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].postal_code, "95816");
        assert_eq!(entries[0].last_call_minutes, Some(60.0));
        assert_eq!(entries[1].lead_minutes, Some(120.0));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let client = reqwest::Client::new();
        let result = load("/definitely/not/here.json", &client).await;
        assert!(matches!(result, Err(PricingError::Io(_))));
    }
}
