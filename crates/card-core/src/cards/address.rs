use super::domain::{MailingAddress, PostalAddress};

/// Only domestic addresses can receive replacement plastics.
pub const DOMESTIC_COUNTRY: &str = "US";
pub const MAILING_LINE_MAX: usize = 36;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAddressError {
    #[error("cannot mail a card to country '{0}'")]
    UnsupportedCountry(String),
}

/// ISO 3166-2 subdivision codes and the postal abbreviation printed on the mailer.
const SUBDIVISIONS: &[(&str, &str)] = &[
    ("US-AL", "AL"),
    ("US-AK", "AK"),
    ("US-AZ", "AZ"),
    ("US-AR", "AR"),
    ("US-CA", "CA"),
    ("US-CO", "CO"),
    ("US-CT", "CT"),
    ("US-DE", "DE"),
    ("US-DC", "DC"),
    ("US-FL", "FL"),
    ("US-GA", "GA"),
    ("US-HI", "HI"),
    ("US-ID", "ID"),
    ("US-IL", "IL"),
    ("US-IN", "IN"),
    ("US-IA", "IA"),
    ("US-KS", "KS"),
    ("US-KY", "KY"),
    ("US-LA", "LA"),
    ("US-ME", "ME"),
    ("US-MD", "MD"),
    ("US-MA", "MA"),
    ("US-MI", "MI"),
    ("US-MN", "MN"),
    ("US-MS", "MS"),
    ("US-MO", "MO"),
    ("US-MT", "MT"),
    ("US-NE", "NE"),
    ("US-NV", "NV"),
    ("US-NH", "NH"),
    ("US-NJ", "NJ"),
    ("US-NM", "NM"),
    ("US-NY", "NY"),
    ("US-NC", "NC"),
    ("US-ND", "ND"),
    ("US-OH", "OH"),
    ("US-OK", "OK"),
    ("US-OR", "OR"),
    ("US-PA", "PA"),
    ("US-RI", "RI"),
    ("US-SC", "SC"),
    ("US-SD", "SD"),
    ("US-TN", "TN"),
    ("US-TX", "TX"),
    ("US-UT", "UT"),
    ("US-VT", "VT"),
    ("US-VA", "VA"),
    ("US-WA", "WA"),
    ("US-WV", "WV"),
    ("US-WI", "WI"),
    ("US-WY", "WY"),
    ("US-AS", "AS"),
    ("US-GU", "GU"),
    ("US-MP", "MP"),
    ("US-PR", "PR"),
    ("US-UM", "UM"),
    ("US-VI", "VI"),
];

/// Short display form of a subdivision code; unknown codes pass through.
pub fn subdivision_display(code: &str) -> &str {
    let trimmed = code.trim();
    SUBDIVISIONS
        .iter()
        .find(|(iso, _)| iso.eq_ignore_ascii_case(trimmed))
        .map(|(_, short)| *short)
        .unwrap_or(trimmed)
}

/// Joins non-blank parts. The separator placed before the n-th joined part is
/// `separators[(n - 1) % separators.len()]`; blank parts consume no separator.
pub fn join_non_blank(parts: &[&str], separators: &[&str]) -> String {
    let mut joined = String::new();
    let mut placed = 0usize;

    for part in parts.iter().map(|part| part.trim()) {
        if part.is_empty() {
            continue;
        }
        if placed > 0 && !separators.is_empty() {
            joined.push_str(separators[(placed - 1) % separators.len()]);
        }
        joined.push_str(part);
        placed += 1;
    }

    joined
}

fn fit(line: &str) -> String {
    line.trim()
        .chars()
        .take(MAILING_LINE_MAX)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Formats a structured address into the three mailer lines.
///
/// When all three input lines are populated, lines 2 and 3 are merged so the
/// city line fits, and the merged line is cut at 36 characters.
pub fn mailing_address(address: &PostalAddress) -> Result<MailingAddress, InvalidAddressError> {
    if !address.country.trim().eq_ignore_ascii_case(DOMESTIC_COUNTRY) {
        return Err(InvalidAddressError::UnsupportedCountry(
            address.country.trim().to_string(),
        ));
    }

    let city_line = join_non_blank(
        &[
            address.city.as_str(),
            subdivision_display(&address.subdivision),
            address.postal_code.as_str(),
        ],
        &[" "],
    );

    let line1 = address.line1.as_str();
    let line2 = address.line2.trim();
    let line3 = address.line3.trim();

    let (line2, line3) = if line2.is_empty() {
        (city_line, line3.to_string())
    } else if line3.is_empty() {
        (line2.to_string(), city_line)
    } else {
        (join_non_blank(&[line2, line3], &[" "]), city_line)
    };

    Ok(MailingAddress {
        line1: fit(line1),
        line2: fit(&line2),
        line3: fit(&line3),
    })
}
