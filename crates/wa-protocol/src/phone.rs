//! Phone normalization (spec.md §6).
//!
//! Applied before any protocol call that takes a phone number. Default
//! country code is Indonesia (`62`), matching the WhatsApp fleet this
//! backend was built to serve.

const COUNTRY_CODE: &str = "62";
const MIN_LEN: usize = 10;
const MAX_LEN: usize = 15;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number has no digits")]
    Empty,
    #[error("normalized phone length {0} is outside the valid range [{MIN_LEN}, {MAX_LEN}]")]
    OutOfRange(usize),
}

/// Strip all non-digits, then apply the Indonesia-default prefixing rules:
/// leading `0` becomes `62`; a leading `8` of length <=12 gets `62`
/// prepended; anything else without a `62` prefix and of length <=12 also
/// gets `62` prepended. Rejects if the final length falls outside [10,15].
pub fn normalize_phone(raw: &str) -> Result<String, PhoneError> {
    let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(PhoneError::Empty);
    }

    if let Some(rest) = digits.strip_prefix('0') {
        digits = format!("{COUNTRY_CODE}{rest}");
    } else if digits.starts_with('8') && digits.len() <= 12 {
        digits = format!("{COUNTRY_CODE}{digits}");
    } else if !digits.starts_with(COUNTRY_CODE) && digits.len() <= 12 {
        digits = format!("{COUNTRY_CODE}{digits}");
    }

    if digits.len() < MIN_LEN || digits.len() > MAX_LEN {
        return Err(PhoneError::OutOfRange(digits.len()));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting_and_keeps_existing_country_code() {
        assert_eq!(normalize_phone("+62 811-1000-111").unwrap(), "628111000111");
    }

    #[test]
    fn leading_zero_becomes_country_code() {
        assert_eq!(normalize_phone("08123456789").unwrap(), "628123456789");
    }

    #[test]
    fn leading_eight_short_enough_gets_prefixed() {
        assert_eq!(normalize_phone("8123456789").unwrap(), "628123456789");
    }

    #[test]
    fn other_short_numbers_get_prefixed() {
        assert_eq!(normalize_phone("123456789").unwrap(), "62123456789");
    }

    #[test]
    fn long_foreign_looking_numbers_pass_through_unprefixed() {
        // Already >12 digits and not 62-prefixed: none of the prepend rules
        // fire, so the digits pass through as-is and are validated by length.
        assert_eq!(normalize_phone("1234567890123").unwrap(), "1234567890123");
    }

    #[test]
    fn rejects_too_short_or_too_long() {
        assert_eq!(normalize_phone("123").unwrap_err(), PhoneError::OutOfRange(5));
        assert_eq!(
            normalize_phone("1234567890123456").unwrap_err(),
            PhoneError::OutOfRange(16)
        );
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(normalize_phone("not-a-number").unwrap_err(), PhoneError::Empty);
    }
}
