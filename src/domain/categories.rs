//! Category name rules.

use super::error::FieldErrors;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 20;

pub fn check_name(value: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let length = value.trim().chars().count();
    if length == 0 {
        errors.push("name", "Category name is required");
    } else if length < NAME_MIN_CHARS {
        errors.push(
            "name",
            format!("Category name must be at least {NAME_MIN_CHARS} characters"),
        );
    } else if length > NAME_MAX_CHARS {
        errors.push(
            "name",
            format!("Category name must be at most {NAME_MAX_CHARS} characters"),
        );
    }
    errors
}
