// src/models.rs
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o";
pub const DEFAULT_EDIT_MODEL: &str = "gpt-image-1";
pub const DEFAULT_SIZE: &str = "1024x1024";
pub const DEFAULT_QUALITY: &str = "standard";
pub const DEFAULT_STYLE: &str = "vivid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOperation {
    Generate,
    Edit,
    Variation,
}

impl ImageOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageOperation::Generate => "generate",
            ImageOperation::Edit => "edit",
            ImageOperation::Variation => "variation",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            ImageOperation::Generate => "Failed to generate image",
            ImageOperation::Edit => "Failed to edit image",
            ImageOperation::Variation => "Failed to create image variation",
        }
    }

    pub fn record_type(&self) -> ImageRecordType {
        match self {
            ImageOperation::Generate => ImageRecordType::Generated,
            ImageOperation::Edit => ImageRecordType::Edited,
            ImageOperation::Variation => ImageRecordType::Variation,
        }
    }
}

/// Options for `/images/generations`. Unset fields are left out of the
/// upstream body entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl GenerationOptions {
    pub fn defaults() -> Self {
        Self {
            model: Some(DEFAULT_GENERATION_MODEL.to_string()),
            n: Some(1),
            quality: Some(DEFAULT_QUALITY.to_string()),
            size: Some(DEFAULT_SIZE.to_string()),
            style: Some(DEFAULT_STYLE.to_string()),
            user: None,
        }
    }

    /// Caller-supplied values win over the defaults.
    pub fn merged_over_defaults(self) -> Self {
        let defaults = Self::defaults();
        Self {
            model: self.model.or(defaults.model),
            n: self.n.or(defaults.n),
            quality: self.quality.or(defaults.quality),
            size: self.size.or(defaults.size),
            style: self.style.or(defaults.style),
            user: self.user.or(defaults.user),
        }
    }
}

/// Options shared by `/images/edits` and `/images/variations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEditOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ImageEditOptions {
    pub fn defaults() -> Self {
        Self {
            model: Some(DEFAULT_EDIT_MODEL.to_string()),
            n: Some(1),
            size: Some(DEFAULT_SIZE.to_string()),
            user: None,
        }
    }

    pub fn merged_over_defaults(self) -> Self {
        let defaults = Self::defaults();
        Self {
            model: self.model.or(defaults.model),
            n: self.n.or(defaults.n),
            size: self.size.or(defaults.size),
            user: self.user.or(defaults.user),
        }
    }

    /// Text fields for a multipart body, numbers stringified, unset options skipped.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(model) = &self.model {
            fields.push(("model", model.clone()));
        }
        if let Some(n) = self.n {
            fields.push(("n", n.to_string()));
        }
        if let Some(size) = &self.size {
            fields.push(("size", size.clone()));
        }
        if let Some(user) = &self.user {
            fields.push(("user", user.clone()));
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Base64(String),
}

/// One image in an upstream response. On the wire this is
/// `{url?, b64_json?, revised_prompt?}`.
///
/// Only one source is kept: when upstream sends both a non-empty `url` and
/// `b64_json`, the URL wins and `b64_json` is not echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireImage", into = "WireImage")]
pub struct ImageResult {
    pub source: Option<ImageSource>,
    pub revised_prompt: Option<String>,
}

impl ImageResult {
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            Some(ImageSource::Url(url)) => Some(url),
            _ => None,
        }
    }

    /// What a browser should put in `src`: the URL, or a PNG data URI.
    pub fn display_source(&self) -> Option<String> {
        match &self.source {
            Some(ImageSource::Url(url)) => Some(url.clone()),
            Some(ImageSource::Base64(b64)) => Some(format!("data:image/png;base64,{}", b64)),
            None => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    b64_json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revised_prompt: Option<String>,
}

impl From<WireImage> for ImageResult {
    fn from(wire: WireImage) -> Self {
        let source = match (wire.url, wire.b64_json) {
            (Some(url), _) if !url.is_empty() => Some(ImageSource::Url(url)),
            (_, Some(b64)) if !b64.is_empty() => Some(ImageSource::Base64(b64)),
            _ => None,
        };
        Self {
            source,
            revised_prompt: wire.revised_prompt,
        }
    }
}

impl From<ImageResult> for WireImage {
    fn from(result: ImageResult) -> Self {
        let (url, b64_json) = match result.source {
            Some(ImageSource::Url(url)) => (Some(url), None),
            Some(ImageSource::Base64(b64)) => (None, Some(b64)),
            None => (None, None),
        };
        Self {
            url,
            b64_json,
            revised_prompt: result.revised_prompt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub created: i64,
    pub data: Vec<ImageResult>,
}

impl GenerationResponse {
    pub fn empty() -> Self {
        Self {
            created: Utc::now().timestamp(),
            data: Vec::new(),
        }
    }

    /// Coerces an upstream body into `{created, data}`. A body without a
    /// `data` array becomes an empty response; items that are not image
    /// objects are dropped and the rest keep their order.
    pub fn normalize(body: Value) -> Self {
        let Some(items) = body.get("data").and_then(Value::as_array) else {
            log::warn!("⚠️ Upstream response has no data array, returning empty result");
            return Self::empty();
        };

        let data = items
            .iter()
            .enumerate()
            .filter_map(
                |(index, item)| match serde_json::from_value::<ImageResult>(item.clone()) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        log::warn!("⚠️ Dropping malformed image item {}: {}", index, e);
                        None
                    }
                },
            )
            .collect();

        let created = body
            .get("created")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| Utc::now().timestamp());

        Self { created, data }
    }

    pub fn first_url(&self) -> Option<&str> {
        self.data.first().and_then(ImageResult::url)
    }
}

/// An image file received from the browser, on its way upstream.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedImage {
    pub fn size_kb(&self) -> usize {
        (self.data.len() + 512) / 1024
    }
}

/// The `/api/generate-image` body, read field by field so a mistyped field
/// never hides a missing prompt. `options` stays raw until the prompt is checked.
#[derive(Debug)]
pub struct GenerateImageBody {
    pub prompt: Option<String>,
    pub options: Option<Value>,
    pub user_id: Option<String>,
}

impl GenerateImageBody {
    pub fn from_value(body: &Value) -> Self {
        let prompt = body
            .get("prompt")
            .and_then(Value::as_str)
            .map(str::to_string);
        let options = body.get("options").filter(|v| !v.is_null()).cloned();
        let user_id = match body.get("userId") {
            Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        Self {
            prompt,
            options,
            user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRecordType {
    Generated,
    Edited,
    Variation,
}

/// A row for the `images` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub user_id: String,
    pub prompt: String,
    pub url: String,
    pub revised_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ImageRecordType,
}

impl ImageRecord {
    /// Builds the record to persist, if the response has a first image with a URL.
    pub fn from_first_result(
        user_id: &str,
        prompt: &str,
        operation: ImageOperation,
        response: &GenerationResponse,
    ) -> Option<Self> {
        let url = response.first_url()?;
        let first = response.data.first()?;

        Some(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
            url: url.to_string(),
            revised_prompt: first.revised_prompt.clone(),
            created_at: Utc::now(),
            kind: operation.record_type(),
        })
    }
}
