//! Postal-code delivery pricing.
//!
//! The table maps 5-digit postal codes to order minimums, delivery fees,
//! and a speakable ETA window. It is rebuilt from a file or URL at boot
//! (best-effort) and on demand through the authenticated reload endpoint;
//! readers always see a complete snapshot because reloads swap the whole
//! table atomically.

mod loader;

pub use loader::load;

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while (re)building the table.
///
/// Row-level defects never surface here; they are skipped during parsing.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Source extension was neither .json nor .csv
    #[error("Unsupported pricing format: {0}")]
    UnsupportedFormat(String),

    /// Local file could not be read
    #[error("Failed to read pricing file: {0}")]
    Io(String),

    /// Remote fetch failed or returned non-2xx
    #[error("Failed to fetch pricing source: {0}")]
    Fetch(String),

    /// Top-level structure was not parseable at all
    #[error("Failed to parse pricing source: {0}")]
    Parse(String),

    /// No source configured to load from
    #[error("No pricing source configured")]
    NoSource,
}

/// One delivery zone row. Immutable once in the table.
#[derive(Debug, Clone, Serialize)]
pub struct PricingEntry {
    /// Exactly five ASCII digits
    pub postal_code: String,
    /// Minimum order amount in dollars
    pub minimum: f64,
    /// Delivery fee in dollars
    pub fee: f64,
    /// Explicit human-readable ETA window, if the source provides one
    pub eta_window: Option<String>,
    /// Lead time in minutes, used to derive a window when none is given
    pub lead_minutes: Option<f64>,
    /// Minutes before closing when same-day orders stop
    pub last_call_minutes: Option<f64>,
}

impl PricingEntry {
    /// Speakable ETA window for this zone.
    ///
    /// An explicit window from the source wins; otherwise the window is
    /// bucketed from the lead time: up to 30 minutes of lead maps to
    /// "1 to 2 hours", 90 or more to "1.5 to 2.5 hours", and anything
    /// else (including zero or absent lead) to "30 minutes to 2 hours".
    pub fn eta(&self) -> String {
        if let Some(window) = &self.eta_window {
            return window.clone();
        }
        match self.lead_minutes {
            Some(lead) if lead > 0.0 && lead <= 30.0 => "1 to 2 hours".to_string(),
            Some(lead) if lead >= 90.0 => "1.5 to 2.5 hours".to_string(),
            _ => "30 minutes to 2 hours".to_string(),
        }
    }
}

/// Immutable snapshot of the full pricing table.
#[derive(Debug, Default)]
pub struct PricingTable {
    entries: HashMap<String, PricingEntry>,
}

impl PricingTable {
    /// Build a table from parsed entries. Later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = PricingEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| (e.postal_code.clone(), e))
            .collect();
        Self { entries }
    }

    /// Look up a postal code, tolerating formatting noise ("95816",
    /// "zip 95-816", " 95816.") in the input. Never errors.
    pub fn lookup(&self, postal_code: &str) -> Option<&PricingEntry> {
        let cleaned: String = postal_code.chars().filter(|c| c.is_ascii_digit()).collect();
        self.entries.get(&cleaned)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide handle to the current snapshot.
///
/// Lookups load the snapshot pointer; reload builds a complete new table
/// off to the side and swaps it in one store, so a concurrent reader sees
/// either the fully-old or the fully-new table.
#[derive(Debug, Default)]
pub struct SharedPricingTable {
    inner: ArcSwap<PricingTable>,
}

impl SharedPricingTable {
    pub fn new(table: PricingTable) -> Self {
        Self {
            inner: ArcSwap::from_pointee(table),
        }
    }

    /// Current snapshot for the duration of one event-processing step.
    pub fn snapshot(&self) -> Arc<PricingTable> {
        self.inner.load_full()
    }

    /// Replace the whole table.
    pub fn replace(&self, table: PricingTable) {
        self.inner.store(Arc::new(table));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(zip: &str, minimum: f64, fee: f64) -> PricingEntry {
        PricingEntry {
            postal_code: zip.to_string(),
            minimum,
            fee,
            eta_window: None,
            lead_minutes: None,
            last_call_minutes: None,
        }
    }

    #[test]
    fn test_lookup_strips_non_digits() {
        let table = PricingTable::from_entries([entry("95816", 40.0, 1.99)]);
        assert!(table.lookup("95816").is_some());
        assert!(table.lookup(" 95-816 ").is_some());
        assert!(table.lookup("zip 95816.").is_some());
        assert!(table.lookup("95817").is_none());
    }

    #[test]
    fn test_explicit_window_wins() {
        let mut e = entry("95816", 40.0, 1.99);
        e.eta_window = Some("45 to 90 minutes".to_string());
        e.lead_minutes = Some(120.0);
        assert_eq!(e.eta(), "45 to 90 minutes");
    }

    #[test]
    fn test_eta_bucketing_from_lead_minutes() {
        let mut e = entry("95816", 40.0, 1.99);

        e.lead_minutes = Some(20.0);
        assert_eq!(e.eta(), "1 to 2 hours");

        e.lead_minutes = Some(30.0);
        assert_eq!(e.eta(), "1 to 2 hours");

        e.lead_minutes = Some(90.0);
        assert_eq!(e.eta(), "1.5 to 2.5 hours");

        e.lead_minutes = Some(120.0);
        assert_eq!(e.eta(), "1.5 to 2.5 hours");

        // Mid-range, zero, and absent all fall to the default bucket
        e.lead_minutes = Some(60.0);
        assert_eq!(e.eta(), "30 minutes to 2 hours");
        e.lead_minutes = Some(0.0);
        assert_eq!(e.eta(), "30 minutes to 2 hours");
        e.lead_minutes = None;
        assert_eq!(e.eta(), "30 minutes to 2 hours");
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let shared = SharedPricingTable::new(PricingTable::from_entries([entry(
            "95816", 40.0, 1.99,
        )]));
        let old = shared.snapshot();
        shared.replace(PricingTable::from_entries([entry("95817", 50.0, 2.99)]));

        // The old snapshot is still fully the old table
        assert!(old.lookup("95816").is_some());
        assert!(old.lookup("95817").is_none());

        // A fresh snapshot is fully the new table
        let new = shared.snapshot();
        assert!(new.lookup("95816").is_none());
        assert!(new.lookup("95817").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_torn_table_under_concurrent_reload() {
        let old: Vec<_> = ["10001", "10002", "10003"]
            .iter()
            .map(|z| entry(z, 40.0, 1.99))
            .collect();
        let new: Vec<_> = ["20001", "20002", "20003"]
            .iter()
            .map(|z| entry(z, 50.0, 2.99))
            .collect();

        let shared = Arc::new(SharedPricingTable::new(PricingTable::from_entries(
            old.clone(),
        )));

        let reader = {
            let shared = shared.clone();
            tokio::spawn(async move {
                for _ in 0..1000 {
                    let snapshot = shared.snapshot();
                    let old_hits = ["10001", "10002", "10003"]
                        .iter()
                        .filter(|z| snapshot.lookup(z).is_some())
                        .count();
                    let new_hits = ["20001", "20002", "20003"]
                        .iter()
                        .filter(|z| snapshot.lookup(z).is_some())
                        .count();
                    // Either fully the old table or fully the new one
                    assert!(
                        (old_hits == 3 && new_hits == 0) || (old_hits == 0 && new_hits == 3),
                        "torn table: {old_hits} old, {new_hits} new"
                    );
                    tokio::task::yield_now().await;
                }
            })
        };

        let writer = {
            let shared = shared.clone();
            let (old, new) = (old.clone(), new.clone());
            tokio::spawn(async move {
                for i in 0..500 {
                    let next = if i % 2 == 0 { new.clone() } else { old.clone() };
                    shared.replace(PricingTable::from_entries(next));
                    tokio::task::yield_now().await;
                }
            })
        };

        reader.await.unwrap();
        writer.await.unwrap();
    }

    #[test]
    fn test_duplicate_zip_last_wins() {
        let table =
            PricingTable::from_entries([entry("95816", 40.0, 1.99), entry("95816", 45.0, 2.49)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup("95816").unwrap().minimum, 45.0);
    }
}
