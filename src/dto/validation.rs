//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted room identifier.
const MAX_ROOM_ID_LENGTH: usize = 64;
/// Largest magnitude accepted for a reported race result.
pub const MAX_RACE_RESULT: f64 = 1_000_000_000.0;

/// Validates that a room ID is 1 to 64 characters of ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_room_id("friday-race") // Ok
/// validate_room_id("")            // Err - empty
/// validate_room_id("a b")         // Err - space
/// ```
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ROOM_ID_LENGTH {
        let mut err = ValidationError::new("room_id_length");
        err.message = Some(
            format!(
                "Room ID must be between 1 and {MAX_ROOM_ID_LENGTH} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("room_id_format");
        err.message =
            Some("Room ID must contain only ASCII letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a reported race result is a finite number within `±MAX_RACE_RESULT`.
pub fn validate_race_result(result: f64) -> Result<(), ValidationError> {
    if !result.is_finite() || result.abs() > MAX_RACE_RESULT {
        let mut err = ValidationError::new("race_result_range");
        err.message = Some(
            format!("Race result must be a finite number within ±{MAX_RACE_RESULT} (got {result})")
                .into(),
        );
        err.add_param("value".into(), &result);
        return Err(err);
    }

    Ok(())
}
