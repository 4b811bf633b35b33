//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a party code only contains uppercase ASCII letters and digits.
///
/// ```ignore
/// validate_party_code("AB12CD") // Ok
/// validate_party_code("ab12cd") // Err - lowercase
/// ```
pub fn validate_party_code(code: &str) -> Result<(), ValidationError> {
    if code.is_empty() || code.len() > 16 {
        let mut err = ValidationError::new("party_code_length");
        err.message = Some(
            format!(
                "Party code must be between 1 and 16 characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("party_code_format");
        err.message = Some("Party code must contain only uppercase letters and digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strings_are_rejected() {
        assert!(validate_not_blank("Friday").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   \t").is_err());
    }

    #[test]
    fn party_codes_are_uppercase_alphanumeric() {
        assert!(validate_party_code("AB12CD").is_ok());
        assert!(validate_party_code("000000").is_ok());
        assert!(validate_party_code("ab12cd").is_err());
        assert!(validate_party_code("AB-2CD").is_err());
        assert!(validate_party_code("").is_err());
    }
}
