/// Input validators
///
/// Length limits, email format checks and a coarse SQL-pattern screen for
/// chosen usernames. Listing content such as titles and descriptions only gets
/// length checks.
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_USERNAME_LENGTH: usize = 254;
pub const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_TEXT_LENGTH: usize = 4096;

lazy_static! {
    // RFC 5322 simplified
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref SQL_INJECTION_PATTERNS: [Regex; 4] = [
        Regex::new(r"(?i)\s+UNION\s+").unwrap(),
        Regex::new(r"(--|;|/\*|\*/)").unwrap(),
        Regex::new(r"(?i);\s*(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER)").unwrap(),
        Regex::new(r#"(?i)(\bOR\b|\bAND\b)\s*(['"][0-9]*['"]|[0-9]*)\s*=\s*(['"][0-9]*['"]|[0-9]*|True|False)"#).unwrap(),
    ];
}

/// Validates an email address and returns it trimmed and lowercased.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a chosen username: non-empty, bounded, no control characters.
///
/// `@` is reserved. A user who picks no username gets their email, so
/// usernames containing `@` always belong to the account with that email.
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username".to_string()));
    }

    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username".to_string(), MAX_USERNAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("username".to_string()));
    }

    if trimmed.contains('@') {
        return Err(ValidationError::InvalidFormat("username".to_string()));
    }

    if contains_sql_injection_patterns(trimmed) {
        return Err(ValidationError::PossibleSQLInjection);
    }

    Ok(trimmed.to_string())
}

/// Passwords are only bounded; bcrypt handles the rest.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Required free text (titles, addresses, amenity names).
pub fn required_text(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }
    if trimmed.len() > MAX_TEXT_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_TEXT_LENGTH));
    }
    if trimmed.contains('\0') {
        return Err(ValidationError::SuspiciousContent(field.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Path identifiers start at 1.
pub fn positive_id(field: &str, id: i64) -> Result<i64, ValidationError> {
    if id < 1 {
        return Err(ValidationError::Rule(format!("{} must be greater than 0", field)));
    }
    Ok(id)
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    email.matches('@').count() != 1 || email.contains('\0')
}

fn contains_sql_injection_patterns(input: &str) -> bool {
    SQL_INJECTION_PATTERNS.iter().any(|pattern| pattern.is_match(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
        assert!(is_valid_email("a@x.com").is_ok());
    }

    #[test]
    fn test_email_is_normalised() {
        assert_eq!(is_valid_email("  John@Example.COM ").unwrap(), "john@example.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());
        assert!(is_valid_email("a@b").is_err());
    }

    #[test]
    fn test_injection_payloads_fail_email_format() {
        assert!(is_valid_email("user' OR '1'='1@example.com").is_err());
        assert!(is_valid_email("user; DROP TABLE@example.com").is_err());
    }

    #[test]
    fn test_double_hyphen_email_is_valid() {
        assert_eq!(is_valid_email("a--b@x.com").unwrap(), "a--b@x.com");
        assert!(is_valid_email("first--last@my-domain.org").is_ok());
    }

    #[test]
    fn test_username() {
        assert_eq!(is_valid_username("  jane ").unwrap(), "jane");
        assert!(is_valid_username("").is_err());
        assert!(is_valid_username("bad\u{7}name").is_err());
        assert!(is_valid_username("x UNION SELECT y").is_err());
    }

    #[test]
    fn test_username_cannot_look_like_an_email() {
        assert_eq!(
            is_valid_username("c@x.com"),
            Err(ValidationError::InvalidFormat("username".to_string()))
        );
        assert!(is_valid_username("@jane").is_err());
    }

    #[test]
    fn test_password_bounds() {
        assert!(is_valid_password("p").is_ok());
        assert!(is_valid_password("").is_err());
        assert!(is_valid_password(&"a".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("title", " Loft ").unwrap(), "Loft");
        assert_eq!(
            required_text("title", "   "),
            Err(ValidationError::EmptyField("title".to_string()))
        );
    }

    #[test]
    fn test_positive_id() {
        assert_eq!(positive_id("user_id", 3), Ok(3));
        assert!(positive_id("user_id", 0).is_err());
        assert!(positive_id("user_id", -1).is_err());
    }
}
