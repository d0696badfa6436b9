//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a sheet name is a plausible storage key: non-empty,
/// ASCII alphanumerics plus `_` and `-`.
pub fn validate_sheet_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        let mut err = ValidationError::new("sheet_name_empty");
        err.message = Some("sheetName must not be empty".into());
        return Err(err);
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("sheet_name_format");
        err.message =
            Some("sheetName may only contain ASCII letters, digits, `_`, and `-`".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a PIN is exactly four ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if pin.len() != 4 || !pin.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("pin_format");
        err.message = Some("PIN must be exactly 4 digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sheet_name_valid() {
        assert!(validate_sheet_name("data_team_1700000000000").is_ok());
        assert!(validate_sheet_name("roster-2026").is_ok());
    }

    #[test]
    fn test_validate_sheet_name_invalid() {
        assert!(validate_sheet_name("").is_err());
        assert!(validate_sheet_name("has space").is_err());
        assert!(validate_sheet_name("slash/name").is_err());
        assert!(validate_sheet_name("dotted.name").is_err());
    }

    #[test]
    fn test_validate_pin_valid() {
        assert!(validate_pin("0000").is_ok());
        assert!(validate_pin("4821").is_ok());
    }

    #[test]
    fn test_validate_pin_invalid() {
        assert!(validate_pin("123").is_err()); // too short
        assert!(validate_pin("12345").is_err()); // too long
        assert!(validate_pin("12a4").is_err()); // non-digit
        assert!(validate_pin("").is_err()); // empty
    }
}
