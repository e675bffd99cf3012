//! Input validation helpers
//!
//! Parameter, alias, email, path and file-name checks shared by the
//! authenticator and the resource manager.

use datacat_core::{parameter_error, CatalogResult};
use regex::Regex;
use std::sync::OnceLock;

static ALIAS_REGEX: OnceLock<Regex> = OnceLock::new();
static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn alias_regex() -> &'static Regex {
    ALIAS_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_+-]+$").unwrap())
}

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[_A-Za-z0-9+-]+(\.[_A-Za-z0-9-]+)*@[A-Za-z0-9-]+(\.[A-Za-z0-9]+)*(\.[A-Za-z]{2,})$")
            .unwrap()
    })
}

/// Reject a missing or empty parameter. The literal string `"null"` counts
/// as missing, since that is what sloppy clients send.
pub fn check_parameter(value: &str, name: &str) -> CatalogResult<()> {
    if value.trim().is_empty() || value == "null" {
        return Err(parameter_error!(
            format!("Missing or empty parameter: {}", name),
            name,
            "validation"
        ));
    }
    Ok(())
}

/// Aliases (and user ids) are restricted to `[A-Za-z0-9_+-]+`.
pub fn check_alias(value: &str, name: &str) -> CatalogResult<()> {
    check_parameter(value, name)?;
    if !alias_regex().is_match(value) {
        return Err(parameter_error!(
            format!(
                "Invalid {}: '{}' (allowed characters: letters, digits, '_', '+', '-')",
                name, value
            ),
            name,
            "validation"
        ));
    }
    Ok(())
}

pub fn check_email(value: &str) -> CatalogResult<()> {
    check_parameter(value, "email")?;
    if !email_regex().is_match(value) {
        return Err(parameter_error!(
            format!("Invalid email address: {}", value),
            "email",
            "validation"
        ));
    }
    Ok(())
}

/// File and folder names must be single path segments.
pub fn check_file_name(value: &str, name: &str) -> CatalogResult<()> {
    check_parameter(value, name)?;
    if value.contains('/') || value == "." || value == ".." {
        return Err(parameter_error!(
            format!("Invalid {}: '{}' (must be a single path segment)", name, value),
            name,
            "validation"
        ));
    }
    Ok(())
}

/// Catalog paths are always relative and may not climb out of the study.
pub fn check_relative_path(value: &str, name: &str) -> CatalogResult<()> {
    check_parameter(value, name)?;
    if value.starts_with('/') {
        return Err(parameter_error!(
            format!("Path must be relative: {}", value),
            name,
            "validation"
        ));
    }
    if value.split('/').any(|segment| segment == "..") {
        return Err(parameter_error!(
            format!("Path may not contain '..': {}", value),
            name,
            "validation"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_null_parameters() {
        assert!(check_parameter("", "name").is_err());
        assert!(check_parameter("   ", "name").is_err());
        assert!(check_parameter("null", "name").is_err());
        assert!(check_parameter("ok", "name").is_ok());
    }

    #[test]
    fn alias_character_set() {
        assert!(check_alias("1000G", "alias").is_ok());
        assert!(check_alias("phase_1+b-2", "alias").is_ok());
        assert!(check_alias("bad alias", "alias").is_err());
        assert!(check_alias("semi;colon", "alias").is_err());
        assert!(check_alias("sla/sh", "alias").is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(check_email("user@example.com").is_ok());
        assert!(check_email("first.last+tag@sub.example.org").is_ok());
        assert!(check_email("not-an-email").is_err());
        assert!(check_email("user@").is_err());
    }

    #[test]
    fn relative_paths_only() {
        assert!(check_relative_path("data/test/file.txt", "path").is_ok());
        assert!(check_relative_path("/data/test", "path").is_err());
        assert!(check_relative_path("data/../etc", "path").is_err());
    }

    #[test]
    fn file_names_are_single_segments() {
        assert!(check_file_name("file.txt", "name").is_ok());
        assert!(check_file_name("dir/file.txt", "name").is_err());
        assert!(check_file_name("..", "name").is_err());
    }
}
