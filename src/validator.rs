use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.\-+]*@[\w.\-+]*\.\w+").expect("valid email pattern"));

/// User input that failed validation, with a message fit for chat
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// The name of the offending field
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: &str) -> Self {
        ValidationError {
            field,
            message: message.to_string(),
        }
    }
}

/// Validate an e-mail address
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > 255 || !EMAIL_PATTERN.is_match(email) {
        return Err(ValidationError::new(
            "email",
            "The e-mail you provided does not appear to be valid. Please check your input and try again.",
        ));
    }
    Ok(())
}

/// Validate a password
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if !(6..=1024).contains(&length) {
        return Err(ValidationError::new(
            "password",
            "The password you provided does not appear to be valid. Passwords must be at least 6 characters in length. Please check your input and try again.",
        ));
    }
    Ok(())
}

/// Validate the input of a login attempt
pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    validate_password(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_login() {
        assert!(validate_login("me@example.com", "secret").is_ok());
        assert!(validate_login("first.last+irc@mail.example.org", "longer password").is_ok());
    }

    #[test]
    fn test_invalid_email() {
        let error = validate_login("not-an-email", "secret").unwrap_err();
        assert_eq!(error.field, "email");
        assert!(error.message.contains("e-mail"));
    }

    #[test]
    fn test_short_password() {
        let error = validate_login("me@example.com", "abc").unwrap_err();
        assert_eq!(error.field, "password");
    }
}
