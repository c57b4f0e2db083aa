//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest room id or host key accepted by the HTTP surface.
pub const MAX_TOKEN_LEN: usize = 64;

/// Validates a category code: ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_category("science")   // Ok
/// validate_category("pop-music") // Ok
/// validate_category("pop music") // Err - space
/// ```
pub fn validate_category(code: &str) -> Result<(), ValidationError> {
    if code.is_empty()
        || !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("category_format");
        err.message =
            Some("Category must contain only letters, digits, '-' or '_'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a room id or host key: non-blank, no whitespace, at most [`MAX_TOKEN_LEN`] characters.
pub fn validate_secret(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("token_empty");
        err.message = Some("Value must not be empty".into());
        return Err(err);
    }

    if trimmed.len() > MAX_TOKEN_LEN || trimmed.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("token_format");
        err.message = Some(
            format!("Value must be a single word of at most {MAX_TOKEN_LEN} characters").into(),
        );
        return Err(err);
    }

    Ok(())
}
