//! Multipart post form parsing.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;
use tracing::error;
use uuid::Uuid;

use crate::application::admin::posts::{CreatePostCommand, UpdatePostCommand};
use crate::application::gateways::ImageUpload;
use crate::infra::http::error::ApiError;

const SOURCE: &str = "infra::http::admin::forms";

/// Raw post form; a field is `None` when the browser did not send it.
#[derive(Debug, Default)]
pub(super) struct PostForm {
    pub(super) title: Option<String>,
    pub(super) summary: Option<String>,
    pub(super) description: Option<String>,
    /// `Some(None)` when the category field was sent empty.
    pub(super) category_id: Option<Option<Uuid>>,
    pub(super) image: Option<ImageUpload>,
}

impl PostForm {
    pub(super) fn into_create(self) -> CreatePostCommand {
        CreatePostCommand {
            title: self.title.unwrap_or_default(),
            summary: self.summary.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            category_id: self.category_id.flatten(),
            image: self.image,
        }
    }

    pub(super) fn into_update(self, id: Uuid) -> UpdatePostCommand {
        UpdatePostCommand {
            id,
            title: self.title,
            summary: self.summary,
            description: self.description,
            category_id: self.category_id,
            image: self.image,
        }
    }
}

fn multipart_error(err: axum_extra::extract::multipart::MultipartError) -> ApiError {
    let status = err.status();
    error!(
        target = "blogdeck::http::admin::forms",
        status = status.as_u16(),
        error = %err,
        "failed to read multipart payload"
    );
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            crate::infra::http::error::codes::UPLOAD,
            "Image is too large",
        ),
        _ => ApiError::bad_request("Invalid form data").with_hint(err.body_text()),
    }
    .from_source(SOURCE)
}

fn parse_category(raw: &str) -> Result<Option<Uuid>, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(trimmed)
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("invalid category id `{trimmed}`")))
}

pub(super) async fn read_post_form(multipart: &mut Multipart) -> Result<PostForm, ApiError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "image" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|value| !value.trim().is_empty());
                let declared = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;

                // Browsers send an empty part when no file was picked.
                let Some(file_name) = file_name.filter(|_| !bytes.is_empty()) else {
                    continue;
                };
                let content_type = declared.unwrap_or_else(|| {
                    mime_guess::from_path(&file_name)
                        .first_or_octet_stream()
                        .to_string()
                });
                if !content_type.starts_with("image/") {
                    return Err(ApiError::bad_request("Only image files can be attached")
                        .with_hint(content_type)
                        .from_source(SOURCE));
                }
                form.image = Some(ImageUpload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "title" | "summary" | "description" | "category" | "category_id" => {
                let value = field.text().await.map_err(multipart_error)?;
                match name.as_str() {
                    "title" => form.title = Some(value),
                    "summary" => form.summary = Some(value),
                    "description" => form.description = Some(value),
                    _ => form.category_id = Some(parse_category(&value)?),
                }
            }
            _ => continue,
        }
    }

    Ok(form)
}
