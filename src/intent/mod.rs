//! Caller-utterance intent classification.
//!
//! `classify` is a total, synchronous, order-sensitive cascade: the first
//! matching rule wins and later rules are never evaluated. It is pure text
//! matching; resolving matched postal codes against the pricing table
//! happens at rendering time (`render`), which keeps classification
//! trivially idempotent.

mod render;

pub use render::{reply_for, transfer_ack, transfer_fallback, unhandled_apology};

use once_cell::sync::Lazy;
use regex::Regex;

/// One classified caller utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentMatch {
    /// Caller asked for a human
    Transfer,
    /// Delivery question about a venue category (hotel, bar, ...)
    VenueDelivery {
        venue: String,
        /// Any postal codes found alongside the venue
        zips: Vec<String>,
    },
    /// Delivery/fee/minimum/ETA question carrying postal code(s)
    ZipDelivery { zips: Vec<String> },
    /// Delivery question with no postal code; prompt for one
    NeedZip,
    /// Fixed informational topic
    Topic(Topic),
    /// Nothing local matched; hand off to the model if one is configured
    Unhandled,
}

/// Fixed informational topics answered from business facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Hours,
    Address,
    Website,
    IdPolicy,
    DeliveryArea,
    Parking,
    Payment,
    Specials,
    Returns,
    Wholesale,
    Events,
}

static TRANSFER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(human|agent|operator|representative|manager|front desk)\b|\b(talk|speak)\s+(to|with)\s+(a\s+|an\s+|the\s+)?(person|human|someone|somebody|manager|agent)\b|\breal person\b|\btransfer me\b",
    )
    .unwrap()
});

static VENUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(hotel|motel|restaurant|bar|truck stop|office|warehouse|airbnb|casino|hospital|campground)\b")
        .unwrap()
});

static DELIVERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(deliver|delivery|deliveries|minimum|min\s+order|fee|charge|eta|how\s+long|how\s+soon|bring)\b")
        .unwrap()
});

static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{5}\b").unwrap());

/// Topic patterns, evaluated in order; the first whose pattern matches wins.
static TOPIC_RES: Lazy<Vec<(Topic, Regex)>> = Lazy::new(|| {
    let table: &[(Topic, &str)] = &[
        (
            Topic::Hours,
            r"(?i)\b(hours|open|close|closing|closed)\b|\bwhat\s+time\b",
        ),
        (
            Topic::Address,
            r"(?i)\b(address|located|location|directions|cross\s+street)\b|\bwhere\s+are\s+you\b|\bhow\s+do\s+i\s+get\b",
        ),
        (
            Topic::Website,
            r"(?i)\b(website|web\s*site|web\s*page|online|url)\b",
        ),
        (
            Topic::IdPolicy,
            r"(?i)\bid\b|\bids\b|\bidentification\b|\bcard\s+me\b|\bunder\s+21\b|\bhow\s+old\b|\bage\s+limit\b",
        ),
        (
            Topic::DeliveryArea,
            r"(?i)\b(areas?|zones?|neighborhoods?)\b|\bparts\s+of\s+town\b",
        ),
        (Topic::Parking, r"(?i)\bpark(ing)?\b"),
        (
            Topic::Payment,
            r"(?i)\b(pay|payment|credit\s+card|debit|apple\s+pay|google\s+pay|cash|venmo)\b",
        ),
        (
            Topic::Specials,
            r"(?i)\b(specials?|deals?|discounts?|promos?|promotions?|sales?|coupons?)\b",
        ),
        (Topic::Returns, r"(?i)\b(returns?|refunds?|exchanges?)\b"),
        (
            Topic::Wholesale,
            r"(?i)\b(wholesale|vendor|distributor|supplier|bulk)\b|\bcarry\s+(our|my)\b",
        ),
        (
            Topic::Events,
            r"(?i)\b(events?|tastings?|demos?|private\s+party)\b|\bbook\s+(a|an)\b",
        ),
    ];
    table
        .iter()
        .map(|(topic, pattern)| (*topic, Regex::new(pattern).unwrap()))
        .collect()
});

/// Classify one caller utterance.
///
/// Total over any input: empty or garbage text yields `Unhandled`, never an
/// error. Multiple postal codes are collected in first-seen order with
/// duplicates removed.
pub fn classify(utterance: &str) -> IntentMatch {
    let text = utterance.trim();
    if text.is_empty() {
        return IntentMatch::Unhandled;
    }

    let zips = extract_zips(text);

    if TRANSFER_RE.is_match(text) {
        return IntentMatch::Transfer;
    }

    if let Some(venue) = VENUE_RE.find(text) {
        if DELIVERY_RE.is_match(text) {
            return IntentMatch::VenueDelivery {
                venue: venue.as_str().to_lowercase(),
                zips,
            };
        }
    }

    if DELIVERY_RE.is_match(text) {
        return if zips.is_empty() {
            IntentMatch::NeedZip
        } else {
            IntentMatch::ZipDelivery { zips }
        };
    }

    for (topic, pattern) in TOPIC_RES.iter() {
        if pattern.is_match(text) {
            return IntentMatch::Topic(*topic);
        }
    }

    // A bare code with no other signal is a caller answering the
    // "what's your zip?" prompt
    if !zips.is_empty() {
        return IntentMatch::ZipDelivery { zips };
    }

    IntentMatch::Unhandled
}

/// All 5-digit codes in the utterance, first-seen order, de-duplicated.
fn extract_zips(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in ZIP_RE.find_iter(text) {
        let code = m.as_str().to_string();
        if !seen.contains(&code) {
            seen.push(code);
        }
    }
    seen
}
