//! Destination number formatting.
//!
//! Numbers without an international prefix are assumed to belong to the
//! configured default country. This is a heuristic, not E.164 validation: a
//! foreign number supplied without `+` or `00` is routed to the default
//! country.

/// Scheme marker for WhatsApp addresses.
pub const WHATSAPP_SCHEME: &str = "whatsapp:";

/// Normalize a caller-supplied number to `+<country><subscriber>`.
///
/// Keeps digits and a leading `+`, then:
/// - already `+...`: unchanged
/// - starts with the default country code: prefix `+`
/// - starts with the `00` trunk prefix: replace it with `+`
/// - otherwise: prefix `+<default_country_code>`
pub fn format_destination(raw: &str, default_country_code: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len() + default_country_code.len() + 1);
    for c in raw.chars() {
        if c.is_ascii_digit() || (c == '+' && cleaned.is_empty()) {
            cleaned.push(c);
        }
    }

    if cleaned.starts_with('+') {
        cleaned
    } else if !default_country_code.is_empty() && cleaned.starts_with(default_country_code) {
        format!("+{}", cleaned)
    } else if let Some(rest) = cleaned.strip_prefix("00") {
        format!("+{}", rest)
    } else {
        format!("+{}{}", default_country_code, cleaned)
    }
}

/// Format a number as a WhatsApp address (`whatsapp:+<number>`).
pub fn whatsapp_address(raw: &str, default_country_code: &str) -> String {
    let raw = raw.trim();
    let number = raw.strip_prefix(WHATSAPP_SCHEME).unwrap_or(raw);
    format!("{}{}", WHATSAPP_SCHEME, format_destination(number, default_country_code))
}

/// Add the WhatsApp scheme to a configured sender if it lacks one.
pub fn ensure_whatsapp_scheme(sender: &str) -> String {
    let sender = sender.trim();
    if sender.starts_with(WHATSAPP_SCHEME) {
        sender.to_string()
    } else {
        format!("{}{}", WHATSAPP_SCHEME, sender)
    }
}
