//! Spoken replies for classified intents.
//!
//! Rendering is where matched postal codes meet the pricing table. Every
//! caller question that classified locally gets a reply here; `Unhandled`
//! returns None so the session can fall through to the upstream model.

use crate::config::BusinessFacts;
use crate::intent::{IntentMatch, Topic};
use crate::pricing::{PricingEntry, PricingTable};
use crate::utils::{format_fee, format_minimum, spoken_digits};

/// How many zones a multi-code summary spells out before cutting off.
const MAX_SUMMARY_ZONES: usize = 3;

/// Render the local reply for an intent, or None when the intent needs the
/// model (`Unhandled`).
pub fn reply_for(
    intent: &IntentMatch,
    table: &PricingTable,
    facts: &BusinessFacts,
) -> Option<String> {
    match intent {
        IntentMatch::Transfer => Some(transfer_ack()),
        IntentMatch::VenueDelivery { venue, zips } => Some(venue_reply(venue, zips, table, facts)),
        IntentMatch::ZipDelivery { zips } => Some(zip_reply(zips, table, facts)),
        IntentMatch::NeedZip => Some(format!("{}.", facts.delivery_area.trim_end_matches('.'))),
        IntentMatch::Topic(topic) => Some(topic_reply(*topic, facts)),
        IntentMatch::Unhandled => None,
    }
}

/// Acknowledgment spoken before a transfer attempt.
pub fn transfer_ack() -> String {
    "Of course, give me one moment while I connect you with a teammate.".to_string()
}

/// Spoken fallback when the live transfer could not be placed.
pub fn transfer_fallback(facts: &BusinessFacts) -> String {
    format!(
        "I wasn't able to connect you just now. You can reach our team directly at {}.",
        spoken_digits_phone(&facts.fallback_phone)
    )
}

/// Apology used when nothing local matched and no model is available.
pub fn unhandled_apology(facts: &BusinessFacts) -> String {
    format!(
        "Sorry, I didn't catch that one. I can help with hours, directions, and delivery \
         quotes by zip code, or connect you with someone at {}.",
        facts.name
    )
}

fn topic_reply(topic: Topic, facts: &BusinessFacts) -> String {
    let line = match topic {
        Topic::Hours => &facts.hours,
        Topic::Address => &facts.address,
        Topic::Website => &facts.domain,
        Topic::IdPolicy => &facts.id_policy,
        Topic::DeliveryArea => &facts.delivery_area,
        Topic::Parking => &facts.parking,
        Topic::Payment => &facts.payment,
        Topic::Specials => &facts.specials,
        Topic::Returns => &facts.returns,
        Topic::Wholesale => &facts.wholesale,
        Topic::Events => &facts.events,
    };
    match topic {
        Topic::Address => format!("You'll find us at {}.", line.trim_end_matches('.')),
        Topic::Website => format!("Everything's on our website, {}.", line.trim_end_matches('.')),
        _ => format!("{}.", line.trim_end_matches('.')),
    }
}

fn venue_reply(
    venue: &str,
    zips: &[String],
    table: &PricingTable,
    facts: &BusinessFacts,
) -> String {
    let resolved = resolve(zips, table);
    match resolved.first() {
        Some(entry) => format!(
            "Yes, we deliver to {venue}s, as long as someone of age meets the driver with ID. {}",
            zone_sentence(entry, facts)
        ),
        None if !zips.is_empty() => format!(
            "We can usually deliver to a {venue}, but I don't see {} in our zones. {}",
            spoken_digits(&zips[0]),
            nearby_or_transfer()
        ),
        None => format!(
            "Yes, we deliver to {venue}s, as long as someone of age meets the driver with ID. \
             What's the zip code there and I'll check the minimum and fee?"
        ),
    }
}

/// One zone: single full sentence. Several: a bounded summary. None found:
/// an apology naming the code, never silence.
fn zip_reply(zips: &[String], table: &PricingTable, facts: &BusinessFacts) -> String {
    let resolved = resolve(zips, table);

    match resolved.len() {
        0 => {
            let code = zips.first().map(String::as_str).unwrap_or_default();
            format!(
                "Sorry, I don't see {} in our delivery zones. {}",
                spoken_digits(code),
                nearby_or_transfer()
            )
        }
        1 => {
            let entry = resolved[0];
            format!("{} {}", zone_sentence(entry, facts), last_call_notice(entry, facts))
        }
        n => {
            let shorts: Vec<String> = resolved
                .iter()
                .take(MAX_SUMMARY_ZONES)
                .map(|e| {
                    format!(
                        "{}: minimum {}, fee {}, {}",
                        spoken_digits(&e.postal_code),
                        format_minimum(e.minimum),
                        format_fee(e.fee),
                        e.eta()
                    )
                })
                .collect();
            format!(
                "I checked {n} zip codes. {}. {}",
                shorts.join(". "),
                last_call_notice(resolved[0], facts)
            )
        }
    }
}

fn zone_sentence(entry: &PricingEntry, _facts: &BusinessFacts) -> String {
    format!(
        "For {}, the minimum order is {}, the delivery fee is {}, and delivery usually takes {}.",
        spoken_digits(&entry.postal_code),
        format_minimum(entry.minimum),
        format_fee(entry.fee),
        entry.eta()
    )
}

fn last_call_notice(entry: &PricingEntry, facts: &BusinessFacts) -> String {
    match entry.last_call_minutes {
        Some(minutes) if minutes > 0.0 => format!(
            "Last call for same-day delivery is {} minutes before closing.",
            minutes.round() as i64
        ),
        _ => format!("{}.", facts.last_call.trim_end_matches('.')),
    }
}

fn nearby_or_transfer() -> String {
    "Is there a nearby zip code I can check, or would you like to talk to a person?".to_string()
}

/// Entries for the given codes, order preserved, unknowns dropped.
fn resolve<'t>(zips: &[String], table: &'t PricingTable) -> Vec<&'t PricingEntry> {
    zips.iter().filter_map(|z| table.lookup(z)).collect()
}

/// "916-555-0134" -> "9 1 6, 5 5 5, 0 1 3 4"
fn spoken_digits_phone(phone: &str) -> String {
    phone
        .split(|c: char| !c.is_ascii_digit())
        .filter(|group| !group.is_empty())
        .map(|group| {
            group
                .chars()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::classify;
    use crate::pricing::PricingEntry;

    fn table() -> PricingTable {
        PricingTable::from_entries([
            PricingEntry {
                postal_code: "95816".to_string(),
                minimum: 40.0,
                fee: 1.99,
                eta_window: None,
                lead_minutes: Some(20.0),
                last_call_minutes: Some(60.0),
            },
            PricingEntry {
                postal_code: "95818".to_string(),
                minimum: 55.0,
                fee: 3.49,
                eta_window: None,
                lead_minutes: Some(120.0),
                last_call_minutes: None,
            },
        ])
    }

    #[test]
    fn test_single_zip_reply_has_all_facts() {
        let facts = BusinessFacts::default();
        let intent = classify("delivery minimum for 95816?");
        let reply = reply_for(&intent, &table(), &facts).unwrap();

        assert!(reply.contains("9-5-8-1-6"));
        assert!(reply.contains("$40"));
        assert!(!reply.contains("$40.00"));
        assert!(reply.contains("$1.99"));
        assert!(reply.contains("1 to 2 hours"));
        assert!(reply.contains("60 minutes before closing"));
    }

    #[test]
    fn test_unknown_zip_apology_names_code() {
        let facts = BusinessFacts::default();
        let intent = classify("can you deliver to 99999");
        let reply = reply_for(&intent, &table(), &facts).unwrap();

        assert!(reply.contains("9-9-9-9-9"));
        assert!(reply.to_lowercase().contains("sorry"));
        assert!(reply.contains("nearby zip") || reply.contains("talk to a person"));
    }

    #[test]
    fn test_multi_zip_summary_counts_and_bounds() {
        let facts = BusinessFacts::default();
        let intent = classify("fees for 95816 and 95818 please");
        let reply = reply_for(&intent, &table(), &facts).unwrap();

        assert!(reply.contains("2 zip codes"));
        assert!(reply.contains("$1.99"));
        assert!(reply.contains("$3.49"));
    }

    #[test]
    fn test_need_zip_prompts_for_code() {
        let facts = BusinessFacts::default();
        let reply = reply_for(&IntentMatch::NeedZip, &table(), &facts).unwrap();
        assert!(reply.to_lowercase().contains("zip"));
    }

    #[test]
    fn test_unhandled_returns_none() {
        let facts = BusinessFacts::default();
        assert!(reply_for(&IntentMatch::Unhandled, &table(), &facts).is_none());
    }

    #[test]
    fn test_venue_with_known_zip() {
        let facts = BusinessFacts::default();
        let intent = classify("do you deliver to a hotel in 95816");
        let reply = reply_for(&intent, &table(), &facts).unwrap();
        assert!(reply.contains("hotel"));
        assert!(reply.contains("$40"));
    }

    #[test]
    fn test_venue_without_zip_asks_for_one() {
        let facts = BusinessFacts::default();
        let intent = classify("do you deliver to hotels?");
        let reply = reply_for(&intent, &table(), &facts).unwrap();
        assert!(reply.to_lowercase().contains("zip"));
    }

    #[test]
    fn test_transfer_fallback_spells_phone() {
        let facts = BusinessFacts::default();
        let line = transfer_fallback(&facts);
        assert!(line.contains("9 1 6, 5 5 5, 0 1 3 4"));
    }

    #[test]
    fn test_topic_replies_end_with_single_period() {
        let facts = BusinessFacts::default();
        for topic in [Topic::Hours, Topic::Payment, Topic::Returns] {
            let reply = reply_for(&IntentMatch::Topic(topic), &table(), &facts).unwrap();
            assert!(reply.ends_with('.'));
            assert!(!reply.ends_with(".."));
        }
    }
}
