//! Kenyan MSISDN handling for STK push.

use thiserror::Error;

pub const COUNTRY_CODE: &str = "254";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Invalid phone number format")]
    Format,

    #[error("Phone number must be a Kenyan mobile number")]
    NotMobile,
}

/// Normalizes a subscriber phone number to `254XXXXXXXXX`.
///
/// Non-digit characters are dropped first. Accepted shapes are the full
/// international form, the local `0XXXXXXXXX` form and a bare nine digit
/// subscriber number.
pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    match digits.len() {
        12 if digits.starts_with(COUNTRY_CODE) => Ok(digits),
        10 if digits.starts_with('0') => Ok(format!("{COUNTRY_CODE}{}", &digits[1..])),
        9 => Ok(format!("{COUNTRY_CODE}{digits}")),
        _ => Err(PhoneError::Format),
    }
}

/// Normalizes and checks for a Safaricom/Airtel mobile prefix (`2547…`/`2541…`).
pub fn validate_phone(raw: &str) -> Result<String, PhoneError> {
    let normalized = normalize_phone(raw)?;
    match normalized.as_bytes().get(COUNTRY_CODE.len()) {
        Some(b'7') | Some(b'1') => Ok(normalized),
        _ => Err(PhoneError::NotMobile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_local_and_bare_forms() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("+254 712 345 678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("0112-345-678").unwrap(), "254112345678");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["0712345678", "712345678", "254712345678", "+254112345678"] {
            let once = normalize_phone(raw).unwrap();
            assert_eq!(normalize_phone(&once).unwrap(), once);
        }
    }

    #[test]
    fn rejects_other_shapes() {
        for raw in ["", "12345", "07123456789", "2547123456", "1712345678", "abc"] {
            assert_eq!(normalize_phone(raw), Err(PhoneError::Format), "{raw}");
        }
    }

    #[test]
    fn validate_requires_mobile_prefix() {
        assert_eq!(validate_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(validate_phone("0112345678").unwrap(), "254112345678");
        assert_eq!(validate_phone("0212345678"), Err(PhoneError::NotMobile));
        assert_eq!(validate_phone("12"), Err(PhoneError::Format));
    }
}
