//! Client-side checks run before anything is sent to the backend.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::{MAX_ACTIONABLE_FILES, MAX_ATTACHMENT_SIZE};
use crate::error::ValidationError;

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-zÀ-ÿ]+(?: [A-Za-zÀ-ÿ]+)*$").unwrap());

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.\-]+@([\w\-]+\.)+[\w\-]{2,4}$").unwrap());

const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName)
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= MIN_PASSWORD_LEN;
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    if long_enough && has_digit && has_letter {
        Ok(())
    } else {
        Err(ValidationError::InvalidPassword)
    }
}

/// Sign-up form: name, then email, then password; the first failure wins.
pub fn validate_signup(name: &str, email: &str, password: &str) -> Result<(), ValidationError> {
    validate_name(name)?;
    validate_login(email, password)
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    validate_password(password)
}

pub fn validate_attachment_size(len: usize) -> Result<(), ValidationError> {
    if len > MAX_ATTACHMENT_SIZE {
        return Err(ValidationError::FileTooLarge {
            max_mib: MAX_ATTACHMENT_SIZE / (1024 * 1024),
        });
    }
    Ok(())
}

pub fn validate_actionable_files(count: usize) -> Result<(), ValidationError> {
    if count > MAX_ACTIONABLE_FILES {
        return Err(ValidationError::TooManyFiles {
            max: MAX_ACTIONABLE_FILES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(validate_name("Ana").is_ok());
        assert!(validate_name("José Álvarez").is_ok());
        assert_eq!(validate_name("Ana  Maria"), Err(ValidationError::InvalidName));
        assert_eq!(validate_name("R2D2"), Err(ValidationError::InvalidName));
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_emails() {
        assert!(validate_email("ana.m-b@mail.example.io").is_ok());
        assert!(validate_email("ana@example").is_err());
        assert!(validate_email("ana@example.technology").is_err());
    }

    #[test]
    fn test_passwords() {
        assert!(validate_password("abc123").is_ok());
        assert!(validate_password("abcdef").is_err());
        assert!(validate_password("123456").is_err());
        assert!(validate_password("ab12").is_err());
    }

    #[test]
    fn test_signup_reports_first_failure() {
        assert_eq!(
            validate_signup("R2D2", "bad", "bad"),
            Err(ValidationError::InvalidName)
        );
        assert_eq!(
            validate_signup("Ana", "bad", "bad"),
            Err(ValidationError::InvalidEmail)
        );
    }

    #[test]
    fn test_attachment_limits() {
        assert!(validate_attachment_size(MAX_ATTACHMENT_SIZE).is_ok());
        assert!(validate_attachment_size(MAX_ATTACHMENT_SIZE + 1).is_err());
        assert!(validate_actionable_files(MAX_ACTIONABLE_FILES).is_ok());
        assert!(validate_actionable_files(MAX_ACTIONABLE_FILES + 1).is_err());
    }
}
