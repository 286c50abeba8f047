// src/handlers.rs
use crate::{AppState, errors::StudioError, models::*};
use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use bytes::BytesMut;
use futures_util::TryStreamExt;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::services::ImageStore;

const PROMPT_PREVIEW_CHARS: usize = 50;

pub async fn generate_image(
    body: web::Bytes,
    data: web::Data<AppState>,
) -> Result<HttpResponse, StudioError> {
    info!("🔄 /api/generate-image: request received");
    handle_generate(&body, &data)
        .await
        .map_err(|e| e.at_boundary(ImageOperation::Generate))
}

pub async fn edit_image(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, StudioError> {
    info!("🔄 /api/edit-image: request received");
    handle_edit(payload, &data)
        .await
        .map_err(|e| e.at_boundary(ImageOperation::Edit))
}

pub async fn image_variation(
    payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, StudioError> {
    info!("🔄 /api/image-variation: request received");
    handle_variation(payload, &data)
        .await
        .map_err(|e| e.at_boundary(ImageOperation::Variation))
}

async fn handle_generate(body: &[u8], data: &AppState) -> Result<HttpResponse, StudioError> {
    let body: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| StudioError::Payload(e.to_string()))?;
    let request = GenerateImageBody::from_value(&body);

    info!(
        "📝 Request data: prompt={:?}, options={}, user={}",
        request.prompt.as_deref().map(preview),
        request
            .options
            .as_ref()
            .map_or_else(|| "none".to_string(), |o| o.to_string()),
        if request.user_id.is_some() { "✓" } else { "✗" }
    );

    let Some(prompt) = request.prompt.filter(|p| !p.trim().is_empty()) else {
        return Err(StudioError::Validation("Prompt is required".to_string()));
    };
    let options = generation_options(request.options)?;

    let api = data.image_api()?;
    info!("🖼️ Generating image with prompt: {}", preview(&prompt));
    let result = api.generate(&prompt, options).await?;
    log_result(ImageOperation::Generate, &result);

    persist_first_result(
        data.image_store(),
        request.user_id.as_deref(),
        &prompt,
        ImageOperation::Generate,
        &result,
    );

    Ok(HttpResponse::Ok().json(&result))
}

/// Converts the raw `options` object. Any shape problem is the caller's to fix.
fn generation_options(raw: Option<serde_json::Value>) -> Result<GenerationOptions, StudioError> {
    let Some(raw) = raw else {
        return Ok(GenerationOptions::default());
    };
    if !raw.is_object() {
        return Err(StudioError::Validation(
            "options must be an object".to_string(),
        ));
    }
    if let Some(n) = raw.get("n").filter(|n| !n.is_null()) {
        match n.as_u64() {
            Some(n) if n > 0 && n <= u64::from(u32::MAX) => {}
            _ => return Err(invalid_n()),
        }
    }

    serde_json::from_value(raw)
        .map_err(|e| StudioError::Validation(format!("Invalid options: {}", e)))
}

async fn handle_edit(payload: Multipart, data: &AppState) -> Result<HttpResponse, StudioError> {
    let mut form = ImageForm::read(payload).await?;
    let prompt = form.text("prompt");
    let image = form.take_file("image");
    let mask = form.take_file("mask");
    let user_id = form.text("userId");

    info!(
        "📝 Request data: prompt={:?}, image={}, mask={}, user={}",
        prompt.as_deref().map(preview),
        describe_file(image.as_ref()),
        describe_file(mask.as_ref()),
        if user_id.is_some() { "✓" } else { "✗" }
    );

    let (Some(prompt), Some(image)) = (prompt, image) else {
        return Err(StudioError::Validation(
            "Prompt and image are required".to_string(),
        ));
    };
    let options = form.edit_options()?;

    let api = data.image_api()?;
    info!("🖼️ Editing image with prompt: {}", preview(&prompt));
    let result = api.edit(image, &prompt, mask, options).await?;
    log_result(ImageOperation::Edit, &result);

    persist_first_result(
        data.image_store(),
        user_id.as_deref(),
        &prompt,
        ImageOperation::Edit,
        &result,
    );

    Ok(HttpResponse::Ok().json(&result))
}

async fn handle_variation(
    payload: Multipart,
    data: &AppState,
) -> Result<HttpResponse, StudioError> {
    let mut form = ImageForm::read(payload).await?;
    let image = form.take_file("image");
    let user_id = form.text("userId");

    info!(
        "📝 Request data: image={}, user={}",
        describe_file(image.as_ref()),
        if user_id.is_some() { "✓" } else { "✗" }
    );

    let Some(image) = image else {
        return Err(StudioError::Validation("Image is required".to_string()));
    };
    let options = form.edit_options()?;

    let api = data.image_api()?;
    info!("🖼️ Creating image variation");
    let result = api.create_variation(image, options).await?;
    log_result(ImageOperation::Variation, &result);

    persist_first_result(
        data.image_store(),
        user_id.as_deref(),
        "Variation",
        ImageOperation::Variation,
        &result,
    );

    Ok(HttpResponse::Ok().json(&result))
}

/// Records the first result in the background. The response never waits on
/// the store, and a store failure is only logged.
fn persist_first_result(
    store: Option<&Arc<dyn ImageStore>>,
    user_id: Option<&str>,
    prompt: &str,
    operation: ImageOperation,
    result: &GenerationResponse,
) {
    let Some(user_id) = user_id else {
        return;
    };
    let Some(record) = ImageRecord::from_first_result(user_id, prompt, operation, result) else {
        warn!("⚠️ Skipping storage due to missing or invalid image data");
        return;
    };
    let Some(store) = store.cloned() else {
        warn!("⚠️ Skipping storage, no image store configured");
        return;
    };

    info!("💾 Storing {} image {}", operation.as_str(), record.id);
    actix_web::rt::spawn(async move {
        match store.insert(&record).await {
            Ok(()) => info!("✅ Image record {} stored", record.id),
            Err(e) => error!("⚠️ Error storing image record {}: {}", record.id, e),
        }
    });
}

fn log_result(operation: ImageOperation, result: &GenerationResponse) {
    if result.data.is_empty() {
        warn!(
            "⚠️ No image data in {} response or unexpected response format",
            operation.as_str()
        );
        return;
    }

    info!(
        "✅ {} returned {} image(s)",
        operation.as_str(),
        result.data.len()
    );
    for (index, image) in result.data.iter().enumerate() {
        let source = match (&image.source, image.display_source()) {
            (Some(ImageSource::Url(_)), Some(src)) => format!("url {}", preview(&src)),
            (Some(ImageSource::Base64(b64)), _) => format!("b64_json ({} chars)", b64.len()),
            _ => "no source".to_string(),
        };
        debug!(
            "📊 image {}: {}, revised prompt: {}",
            index,
            source,
            image.revised_prompt.is_some()
        );
    }
}

fn preview(prompt: &str) -> String {
    let mut preview: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
    if prompt.chars().count() > PROMPT_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn describe_file(file: Option<&UploadedImage>) -> String {
    match file {
        Some(file) => format!(
            "{} ({}KB, {})",
            file.filename,
            file.size_kb(),
            file.content_type.as_deref().unwrap_or("unknown")
        ),
        None => "none".to_string(),
    }
}

fn invalid_n() -> StudioError {
    StudioError::Validation("n must be a positive integer".to_string())
}

/// A multipart body split into text fields and non-empty file uploads.
/// Like a browser's `FormData::get`, the first value of a repeated name wins.
#[derive(Debug, Default)]
struct ImageForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedImage>,
}

impl ImageForm {
    async fn read(mut payload: Multipart) -> Result<Self, StudioError> {
        let mut form = Self::default();

        while let Some(mut field) = payload.try_next().await? {
            let content_disposition = field.content_disposition();
            let Some(name) = content_disposition.get_name().map(str::to_string) else {
                continue;
            };
            let filename = content_disposition.get_filename().map(str::to_string);
            let content_type = field.content_type().map(|ct| ct.to_string());

            let mut buf = BytesMut::new();
            while let Some(chunk) = field.try_next().await? {
                buf.extend_from_slice(&chunk);
            }

            match filename {
                Some(filename) => {
                    // An empty file input still submits a part with no bytes.
                    if !buf.is_empty() {
                        form.files.entry(name).or_insert(UploadedImage {
                            filename,
                            content_type,
                            data: buf.freeze(),
                        });
                    }
                }
                None => {
                    let text = String::from_utf8(buf.to_vec()).map_err(|e| {
                        StudioError::Payload(format!("Field {} is not UTF-8: {}", name, e))
                    })?;
                    form.fields.entry(name).or_insert(text);
                }
            }
        }

        Ok(form)
    }

    /// The field as submitted, or `None` when it is missing or blank.
    fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn take_file(&mut self, name: &str) -> Option<UploadedImage> {
        self.files.remove(name)
    }

    fn edit_options(&self) -> Result<ImageEditOptions, StudioError> {
        let n = match self.text("n") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => Some(n),
                _ => return Err(invalid_n()),
            },
            None => None,
        };

        Ok(ImageEditOptions {
            model: self.text("model"),
            n,
            size: self.text("size"),
            user: None,
        })
    }
}
