//! Validation helpers for client-asserted identity fields.

use validator::ValidationError;

const MAX_NAME_LEN: usize = 32;
const MAX_ID_LEN: usize = 64;

/// Validates a display name: non-blank and at most 32 characters.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    if name.chars().count() > MAX_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message =
            Some(format!("Player name must be at most {MAX_NAME_LEN} characters").into());
        return Err(err);
    }

    Ok(())
}

/// Validates a client-asserted player id: non-empty and at most 64 characters.
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        let mut err = ValidationError::new("player_id_empty");
        err.message = Some("Player id must not be empty".into());
        return Err(err);
    }

    if id.chars().count() > MAX_ID_LEN {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(format!("Player id must be at most {MAX_ID_LEN} characters").into());
        return Err(err);
    }

    Ok(())
}
