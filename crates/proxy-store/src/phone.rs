//! Phone number normalization.

/// Normalize a phone number to E.164 format.
///
/// Formatting characters are dropped. Numbers written without a leading `+`
/// must carry a country code (at least 10 digits).
pub fn normalize_phone_number(number: &str) -> Result<String, String> {
    let has_plus = number.trim_start().starts_with('+');
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(format!("'{}' must contain at least one digit", number));
    }

    if digits.len() < 7 {
        return Err(format!("'{}' is too short", number));
    }

    if digits.len() > 15 {
        return Err(format!("'{}' is too long", number));
    }

    if has_plus || digits.len() >= 10 {
        Ok(format!("+{}", digits))
    } else {
        Err(format!("'{}' must include a country code", number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_number() {
        assert_eq!(
            normalize_phone_number("+1 (222) 333-4444"),
            Ok("+12223334444".into())
        );
        assert_eq!(
            normalize_phone_number("+12223334444"),
            Ok("+12223334444".into())
        );
        assert_eq!(
            normalize_phone_number("12223334444"),
            Ok("+12223334444".into())
        );
    }

    #[test]
    fn test_normalize_rejects_bad_numbers() {
        assert!(normalize_phone_number("").is_err());
        assert!(normalize_phone_number("123").is_err());
        assert!(normalize_phone_number("5551234").is_err());
        assert!(normalize_phone_number("+1234567890123456").is_err());
    }

    #[test]
    fn test_short_number_with_plus_is_accepted() {
        assert_eq!(normalize_phone_number("+4930123"), Ok("+4930123".into()));
    }
}
