//! Axum route handler for caption generation.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use crate::captions::models::CaptionResponse;
use crate::captions::parser::parse_completions;
use crate::captions::prompts::build_prompt;
use crate::errors::AppError;
use crate::llm_client::ImageInput;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

/// The uploaded image part.
#[derive(Debug)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Decoded `multipart/form-data` body of `POST /generate`.
#[derive(Debug)]
pub struct CaptionForm {
    pub image: Upload,
    pub style: String,
    pub language: String,
    pub context: String,
}

impl CaptionForm {
    /// Reads every part of the form. Unknown parts are skipped.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut image = None;
        let mut style = None;
        let mut language = None;
        let mut context = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let content_type = field.content_type().map(str::to_string);
                    let file_name = field.file_name().map(str::to_string);
                    image = Some(Upload {
                        bytes: field.bytes().await?,
                        content_type,
                        file_name,
                    });
                }
                "type" | "style" => style = Some(field.text().await?),
                "language" => language = Some(field.text().await?),
                "context" => context = Some(field.text().await?),
                other => debug!("Ignoring unexpected form field '{other}'"),
            }
        }

        let image =
            image.ok_or_else(|| AppError::Validation("Missing 'image' upload".to_string()))?;
        if image.bytes.is_empty() {
            return Err(AppError::Validation("Uploaded image is empty".to_string()));
        }
        if let Some(ct) = image.content_type.as_deref() {
            if !is_acceptable_content_type(ct) {
                return Err(AppError::Validation(format!(
                    "Uploaded file must be an image, got '{ct}'"
                )));
            }
        }

        Ok(CaptionForm {
            image,
            style: style.ok_or_else(|| AppError::Validation("Missing 'type' field".to_string()))?,
            language: language
                .ok_or_else(|| AppError::Validation("Missing 'language' field".to_string()))?,
            context: context.unwrap_or_default(),
        })
    }
}

/// Browsers send `image/*`; some clients only manage `application/octet-stream`.
fn is_acceptable_content_type(content_type: &str) -> bool {
    let ct = content_type.trim().to_ascii_lowercase();
    ct.starts_with("image/") || ct == "application/octet-stream"
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /generate
///
/// Full pipeline: decode upload → build prompt → one model call → parse completion.
/// Returns up to three caption records in the order the model produced them.
#[tracing::instrument(name = "generate", skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn handle_generate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CaptionResponse>, AppError> {
    let form = CaptionForm::from_multipart(multipart).await?;

    let prompt = build_prompt(&form.style, &form.language, &form.context);
    let image = ImageInput::from_upload(
        &form.image.bytes,
        form.image.content_type.as_deref(),
        form.image.file_name.as_deref(),
    );

    info!(
        style = %form.style,
        language = %form.language,
        media_type = %image.media_type,
        bytes = form.image.bytes.len(),
        "Generating captions"
    );

    let completion = state.model.complete(&image, &prompt).await?;
    debug!("Model completion: {completion}");

    let captions = parse_completions(&completion);
    info!(count = captions.len(), "Captions generated");

    Ok(Json(CaptionResponse { captions }))
}
