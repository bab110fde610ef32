//! Phone number canonicalization
//!
//! Every component that compares, stores, or logs a phone number goes through
//! this module. Comparison always happens on the E.164 form; logging always
//! happens on the masked form.

/// Normalize a free-form phone string to E.164
///
/// Rules, applied to the digits only (all other characters are stripped):
/// - exactly 10 digits: North American number, prefix `+1`
/// - 11 or more digits starting with `1`: prefix `+`
/// - any other non-empty digit string: prefix `+`
///
/// Returns `None` when the input is absent or contains no digits. Callers
/// must treat `None` as a validation failure, never substitute a default.
///
/// # Examples
///
/// ```
/// use lexline_common::normalize_phone;
///
/// assert_eq!(normalize_phone("(555) 123-4567").as_deref(), Some("+15551234567"));
/// assert_eq!(normalize_phone("15551234567").as_deref(), Some("+15551234567"));
/// assert_eq!(normalize_phone(""), None);
/// ```
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return None;
    }

    if digits.len() == 10 {
        return Some(format!("+1{}", digits));
    }

    // 11-digit NANP and longer numbers that already carry the country code
    // both just need the plus sign, as does everything else
    Some(format!("+{}", digits))
}

/// Normalize an optional phone string
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.and_then(normalize_phone)
}

/// Mask a phone number for logs and diagnostics, keeping the last four digits
///
/// ```
/// use lexline_common::mask_phone;
///
/// assert_eq!(mask_phone("+15551234567"), "***4567");
/// assert_eq!(mask_phone("12"), "***");
/// ```
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return "***".to_string();
    }
    let last_four: String = digits[digits.len() - 4..].iter().collect();
    format!("***{}", last_four)
}

/// Mask an optional phone number (`"<none>"` when absent)
pub fn mask_optional(phone: Option<&str>) -> String {
    phone.map(mask_phone).unwrap_or_else(|| "<none>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_digit_number_gets_country_code() {
        assert_eq!(normalize_phone("(555) 123-4567").as_deref(), Some("+15551234567"));
        assert_eq!(normalize_phone("555.123.4567").as_deref(), Some("+15551234567"));
    }

    #[test]
    fn test_eleven_digit_nanp_number() {
        assert_eq!(normalize_phone("15551234567").as_deref(), Some("+15551234567"));
        assert_eq!(normalize_phone("+1 (555) 123-4567").as_deref(), Some("+15551234567"));
    }

    #[test]
    fn test_long_number_with_leading_one() {
        assert_eq!(normalize_phone("1555123456789").as_deref(), Some("+1555123456789"));
    }

    #[test]
    fn test_international_number_keeps_digits() {
        assert_eq!(normalize_phone("+44 20 7946 0958").as_deref(), Some("+442079460958"));
    }

    #[test]
    fn test_empty_and_unparseable_input() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("anonymous"), None);
        assert_eq!(normalize_phone("+-() "), None);
        assert_eq!(normalize_optional(None), None);
    }

    #[test]
    fn test_mask_keeps_last_four_digits() {
        assert_eq!(mask_phone("+15551234567"), "***4567");
        assert_eq!(mask_phone("(555) 123-4567"), "***4567");
        assert_eq!(mask_optional(None), "<none>");
    }
}
