//! Post field rules and display helpers.

use super::error::FieldErrors;

pub const TITLE_MIN_CHARS: usize = 5;
pub const TITLE_MAX_CHARS: usize = 100;
pub const SUMMARY_MIN_CHARS: usize = 10;
pub const DESCRIPTION_MIN_CHARS: usize = 20;

/// Label shown for posts without a resolvable category.
pub const UNCATEGORIZED_LABEL: &str = "General";

pub fn check_title(value: &str, errors: &mut FieldErrors) {
    let length = value.trim().chars().count();
    if length == 0 {
        errors.push("title", "Title is required");
    } else if length < TITLE_MIN_CHARS {
        errors.push(
            "title",
            format!("Title must be at least {TITLE_MIN_CHARS} characters"),
        );
    } else if length > TITLE_MAX_CHARS {
        errors.push(
            "title",
            format!("Title must be at most {TITLE_MAX_CHARS} characters"),
        );
    }
}

pub fn check_summary(value: &str, errors: &mut FieldErrors) {
    check_min_length("summary", "Summary", value, SUMMARY_MIN_CHARS, errors);
}

pub fn check_description(value: &str, errors: &mut FieldErrors) {
    check_min_length(
        "description",
        "Description",
        value,
        DESCRIPTION_MIN_CHARS,
        errors,
    );
}

fn check_min_length(
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
    errors: &mut FieldErrors,
) {
    let length = value.trim().chars().count();
    if length == 0 {
        errors.push(field, format!("{label} is required"));
    } else if length < min {
        errors.push(field, format!("{label} must be at least {min} characters"));
    }
}

/// Checks every field of a new post at once so all failures are reported together.
pub fn check_new_post(title: &str, summary: &str, description: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    check_title(title, &mut errors);
    check_summary(summary, &mut errors);
    check_description(description, &mut errors);
    errors
}

pub fn category_label(name: Option<&str>) -> &str {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => UNCATEGORIZED_LABEL,
    }
}

/// Storage object name for an uploaded post image: `{prefix}/{millis}.{ext}`.
pub fn image_object_name(prefix: &str, file_name: &str, unix_millis: i128) -> String {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{unix_millis}.{extension}")
    } else {
        format!("{prefix}/{unix_millis}.{extension}")
    }
}
