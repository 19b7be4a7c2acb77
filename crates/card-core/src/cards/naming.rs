//! Name rules for the embossed plastic and the card-management name fields.

pub const EMBOSSED_NAME_MAX: usize = 21;
pub const MAINTENANCE_FIELD_MAX: usize = 20;
pub const MAINTENANCE_COMBINED_MAX: usize = 24;

/// Upper-cases, collapses whitespace runs to one space and trims.
fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect::<String>().trim_end().to_string()
}

fn compose(first: &str, last: &str) -> String {
    normalize(&format!("{first} {last}"))
}

/// First character of the trimmed value, upper-cased.
pub fn initial(value: &str) -> String {
    value
        .trim()
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}

/// Name embossed on the plastic, at most 21 characters.
pub fn embossed_name(first: &str, last: &str) -> String {
    let first = normalize(first);
    let last = normalize(last);

    let full = compose(&first, &last);
    if full.chars().count() <= EMBOSSED_NAME_MAX {
        return full;
    }

    if last.is_empty() {
        return truncate(&first, EMBOSSED_NAME_MAX);
    }

    truncate(&compose(&initial(&first), &last), EMBOSSED_NAME_MAX)
}

/// First and last name fields sent with a replacement order.
///
/// Each field is capped at 20 characters; when both together exceed 24 the
/// first name collapses to its initial.
pub fn maintenance_name(first: &str, last: &str) -> (String, String) {
    let first = truncate(&normalize(first), MAINTENANCE_FIELD_MAX);
    let last = truncate(&normalize(last), MAINTENANCE_FIELD_MAX);

    if last.is_empty() {
        return (first, last);
    }

    if first.chars().count() + last.chars().count() > MAINTENANCE_COMBINED_MAX {
        return (initial(&first), last);
    }

    (first, last)
}
