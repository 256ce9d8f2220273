//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a user's display name
pub fn validate_display_name(name: &str) -> Result<(), String> {
    let name = name.trim();

    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.chars().count() > 100 {
        return Err("Name must be at most 100 characters long".to_string());
    }

    Ok(())
}

/// Validate role name
pub fn validate_role_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Role name is required".to_string());
    }

    if name.len() > 64 {
        return Err("Role name must be at most 64 characters long".to_string());
    }

    static ROLE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = ROLE_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9 _-]*$").expect("Failed to compile role name regex")
    });

    if !regex.is_match(name) {
        return Err(
            "Role name can only contain letters, numbers, spaces, hyphens and underscores"
                .to_string(),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("first.last+ops@city.gov.uk").is_ok());
        assert_eq!(validate_email(""), Err("Email is required".to_string()));
        assert_eq!(
            validate_email("alice@localhost"),
            Err("Invalid email format".to_string())
        );
        assert!(validate_email(&format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("Alice Doe").is_ok());
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_role_name() {
        assert!(validate_role_name("editor").is_ok());
        assert!(validate_role_name("Map Editors_2").is_ok());
        assert!(validate_role_name("").is_err());
        assert!(validate_role_name(" leading-space").is_err());
        assert!(validate_role_name("drop;table").is_err());
        assert!(validate_role_name(&"r".repeat(65)).is_err());
    }
}
