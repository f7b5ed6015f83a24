//! Business facts used by the canned answers and the model system prompt.
//!
//! Every field can be overridden from the environment; defaults describe the
//! demo storefront so the gateway answers sensibly out of the box.

use std::env;

/// Static facts about the business the gateway answers for.
#[derive(Debug, Clone)]
pub struct BusinessFacts {
    /// Store display name, spoken in greetings and apologies
    pub name: String,
    /// Web domain, e.g. "storeline.example.com" (sanitized before speech)
    pub domain: String,
    /// Contact email (sanitized before speech)
    pub email: String,
    /// Phone number spoken when a live transfer fails
    pub fallback_phone: String,
    /// Street address with directions hint
    pub address: String,
    /// Opening hours, one spoken sentence
    pub hours: String,
    /// Age/ID policy
    pub id_policy: String,
    /// General delivery-area description (no specific zip)
    pub delivery_area: String,
    /// Accepted payment methods
    pub payment: String,
    /// Current specials/promotions line
    pub specials: String,
    /// Parking guidance
    pub parking: String,
    /// Return policy
    pub returns: String,
    /// Vendor/wholesale inquiry guidance
    pub wholesale: String,
    /// Demo/event booking guidance
    pub events: String,
    /// Last-call cutoff notice appended to delivery quotes
    pub last_call: String,
}

impl Default for BusinessFacts {
    fn default() -> Self {
        Self {
            name: "Storeline Market".to_string(),
            domain: "storelinemarket.com".to_string(),
            email: "hello@storelinemarket.com".to_string(),
            fallback_phone: "916-555-0134".to_string(),
            address: "2410 J Street in midtown Sacramento, between 24th and 25th".to_string(),
            hours: "We're open every day from 10 AM to 9 PM, and until 10 PM on Fridays \
                    and Saturdays"
                .to_string(),
            id_policy: "Everyone gets carded at the door or at delivery, no exceptions. \
                        Please have a valid government-issued photo ID ready"
                .to_string(),
            delivery_area: "We deliver across the Sacramento area. Tell me your five digit \
                            zip code and I can give you the minimum, the fee, and a time window"
                .to_string(),
            payment: "We take all major cards, Apple Pay, Google Pay, and cash at the counter. \
                      Delivery orders are card or digital wallet only"
                .to_string(),
            specials: "We run weekly specials. Today's deals are posted in the store and on \
                       our website"
                .to_string(),
            parking: "There's free customer parking behind the building, and street parking \
                      on J Street after 6 PM"
                .to_string(),
            returns: "Unopened items can be returned with a receipt within 30 days"
                .to_string(),
            wholesale: "For vendor or wholesale inquiries, email our buying team and they'll \
                        get back to you within a couple of days"
                .to_string(),
            events: "We host tastings and demos most weekends. Leave your name with our team \
                     and we'll add you to the invite list"
                .to_string(),
            last_call: "Last call for same-day delivery is one hour before closing".to_string(),
        }
    }
}

impl BusinessFacts {
    /// Load facts from the environment, falling back to defaults per field.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env::var("STORE_NAME").unwrap_or(defaults.name),
            domain: env::var("STORE_DOMAIN").unwrap_or(defaults.domain),
            email: env::var("STORE_EMAIL").unwrap_or(defaults.email),
            fallback_phone: env::var("STORE_FALLBACK_PHONE").unwrap_or(defaults.fallback_phone),
            address: env::var("STORE_ADDRESS").unwrap_or(defaults.address),
            hours: env::var("STORE_HOURS").unwrap_or(defaults.hours),
            id_policy: env::var("STORE_ID_POLICY").unwrap_or(defaults.id_policy),
            delivery_area: env::var("STORE_DELIVERY_AREA").unwrap_or(defaults.delivery_area),
            payment: env::var("STORE_PAYMENT").unwrap_or(defaults.payment),
            specials: env::var("STORE_SPECIALS").unwrap_or(defaults.specials),
            parking: env::var("STORE_PARKING").unwrap_or(defaults.parking),
            returns: env::var("STORE_RETURNS").unwrap_or(defaults.returns),
            wholesale: env::var("STORE_WHOLESALE").unwrap_or(defaults.wholesale),
            events: env::var("STORE_EVENTS").unwrap_or(defaults.events),
            last_call: env::var("STORE_LAST_CALL").unwrap_or(defaults.last_call),
        }
    }

    /// Greeting used when none is configured.
    pub fn default_greeting(&self) -> String {
        format!(
            "Thanks for calling {}! I can help with hours, directions, and delivery. \
             What can I do for you?",
            self.name
        )
    }

    /// System prompt for the upstream model, carrying every fact so the
    /// model never needs out-of-band context.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are the phone assistant for {name}. Answer in one or two short spoken \
             sentences, no lists, no markdown. Facts you may use: Hours: {hours}. \
             Address: {address}. ID policy: {id_policy}. Delivery: {delivery_area}. \
             Payment: {payment}. {last_call}. If you don't know, say so and offer to \
             transfer the caller to a person. Never invent prices.",
            name = self.name,
            hours = self.hours,
            address = self.address,
            id_policy = self.id_policy,
            delivery_area = self.delivery_area,
            payment = self.payment,
            last_call = self.last_call,
        )
    }

    /// Canned sentence used when the model is unreachable.
    pub fn model_fallback_line(&self) -> String {
        format!(
            "Sorry, I'm having trouble with that one right now. {hours}. We're at {address}. \
             {id_policy}. {delivery_area}.",
            hours = self.hours,
            address = self.address,
            id_policy = self.id_policy,
            delivery_area = self.delivery_area,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_carries_all_facts() {
        let facts = BusinessFacts::default();
        let prompt = facts.system_prompt();
        assert!(prompt.contains(&facts.hours));
        assert!(prompt.contains(&facts.address));
        assert!(prompt.contains(&facts.id_policy));
        assert!(prompt.contains(&facts.payment));
    }

    #[test]
    fn test_default_greeting_names_store() {
        let facts = BusinessFacts::default();
        assert!(facts.default_greeting().contains("Storeline Market"));
    }
}
