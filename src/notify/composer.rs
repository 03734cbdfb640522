//! Message composition from per-event templates.
//!
//! The set of recognized event kinds is deliberately a configurable mapping
//! rather than an enum baked into the code: storefronts disagree on whether
//! they emit `order/fulfilled` or `order/shipped`, and adding a kind should
//! be a config edit. An event with no template is a no-op, not an error.

use std::collections::HashMap;

use serde::Deserialize;

use crate::commerce::Order;

/// Placeholder-based message templates keyed by event kind.
///
/// Supported placeholders: `{name}`, `{number}`, `{tracking_number}`,
/// `{tracking_url}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct EventTemplates {
    templates: HashMap<String, String>,
}

impl Default for EventTemplates {
    fn default() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "order/paid".to_owned(),
            "Hi {name}! Payment for order #{number} is confirmed. \
             We are getting it ready for shipment."
                .to_owned(),
        );
        templates.insert(
            "order/fulfilled".to_owned(),
            "Good news, {name}! Order #{number} is on its way.\n\
             Tracking number: {tracking_number}\n{tracking_url}"
                .to_owned(),
        );
        templates.insert(
            "order/cancelled".to_owned(),
            "Hi {name}, order #{number} has been cancelled. \
             Reply here if we can help with anything."
                .to_owned(),
        );
        Self { templates }
    }
}

impl EventTemplates {
    /// Build from an explicit mapping (config override).
    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    /// Event kinds with a configured template.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Render the message for `event`, or `None` when the kind has no
    /// template configured.
    pub fn render(&self, event: &str, order: &Order) -> Option<String> {
        let template = self.templates.get(event)?;
        let name = order
            .customer
            .as_ref()
            .map(|c| c.first_name().to_owned())
            .unwrap_or_default();
        Some(
            template
                .replace("{name}", &name)
                .replace("{number}", &order.number.to_string())
                .replace(
                    "{tracking_number}",
                    order
                        .shipping_tracking_number
                        .as_deref()
                        .unwrap_or("not yet available"),
                )
                .replace(
                    "{tracking_url}",
                    order.shipping_tracking_url.as_deref().unwrap_or(""),
                ),
        )
    }
}

/// Convert a phone number on file into a WhatsApp JID.
///
/// Strips everything but digits; the bridge expects
/// `<digits>@s.whatsapp.net`.
pub fn jid_for_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    format!("{digits}@s.whatsapp.net")
}
