// src/services/image_api.rs
use crate::config::FailurePolicy;
use crate::errors::StudioError;
use crate::models::*;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Serialize;

/// The three upstream image operations the handlers depend on.
#[async_trait]
pub trait ImageApi: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<GenerationResponse, StudioError>;

    async fn edit(
        &self,
        image: UploadedImage,
        prompt: &str,
        mask: Option<UploadedImage>,
        options: ImageEditOptions,
    ) -> Result<GenerationResponse, StudioError>;

    async fn create_variation(
        &self,
        image: UploadedImage,
        options: ImageEditOptions,
    ) -> Result<GenerationResponse, StudioError>;
}

#[derive(Serialize)]
struct GenerationBody<'a> {
    #[serde(flatten)]
    options: &'a GenerationOptions,
    prompt: &'a str,
}

pub struct OpenAIImageClient {
    api_key: String,
    base_url: String,
    failure_policy: FailurePolicy,
    client: Client,
}

impl OpenAIImageClient {
    pub fn new(api_key: String, base_url: impl Into<String>, failure_policy: FailurePolicy) -> Self {
        Self {
            api_key,
            base_url: base_url.into(),
            failure_policy,
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read_response(response: Response) -> Result<GenerationResponse, StudioError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StudioError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StudioError::Transport(format!("Failed to parse image response: {}", e)))?;

        Ok(GenerationResponse::normalize(body))
    }

    fn apply_policy(
        &self,
        operation: ImageOperation,
        result: Result<GenerationResponse, StudioError>,
    ) -> Result<GenerationResponse, StudioError> {
        match (result, self.failure_policy) {
            (Ok(response), _) => {
                debug!(
                    "{} returned {} image(s)",
                    operation.as_str(),
                    response.data.len()
                );
                Ok(response)
            }
            (Err(e), FailurePolicy::Propagate) => Err(e),
            (Err(e), FailurePolicy::EmptyResult) => {
                error!(
                    "❌ {} failed, returning empty result: {}",
                    operation.as_str(),
                    e
                );
                Ok(GenerationResponse::empty())
            }
        }
    }

    async fn send_generation(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<GenerationResponse, StudioError> {
        let options = options.merged_over_defaults();
        let response = self
            .client
            .post(self.endpoint("images/generations"))
            .bearer_auth(&self.api_key)
            .json(&GenerationBody {
                options: &options,
                prompt,
            })
            .send()
            .await?;

        Self::read_response(response).await
    }

    async fn send_form(&self, path: &str, form: Form) -> Result<GenerationResponse, StudioError> {
        // reqwest sets the multipart Content-Type with its boundary.
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        Self::read_response(response).await
    }
}

fn file_part(image: UploadedImage) -> Result<Part, StudioError> {
    let part = Part::bytes(image.data.to_vec()).file_name(image.filename);
    match image.content_type {
        Some(content_type) => part
            .mime_str(&content_type)
            .map_err(|e| StudioError::Payload(format!("Invalid content type {}: {}", content_type, e))),
        None => Ok(part),
    }
}

fn with_options(mut form: Form, options: &ImageEditOptions) -> Form {
    for (name, value) in options.form_fields() {
        form = form.text(name, value);
    }
    form
}

#[async_trait]
impl ImageApi for OpenAIImageClient {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<GenerationResponse, StudioError> {
        let result = self.send_generation(prompt, options).await;
        self.apply_policy(ImageOperation::Generate, result)
    }

    async fn edit(
        &self,
        image: UploadedImage,
        prompt: &str,
        mask: Option<UploadedImage>,
        options: ImageEditOptions,
    ) -> Result<GenerationResponse, StudioError> {
        let mut form = Form::new()
            .part("image", file_part(image)?)
            .text("prompt", prompt.to_string());
        if let Some(mask) = mask {
            form = form.part("mask", file_part(mask)?);
        }
        let form = with_options(form, &options.merged_over_defaults());

        let result = self.send_form("images/edits", form).await;
        self.apply_policy(ImageOperation::Edit, result)
    }

    async fn create_variation(
        &self,
        image: UploadedImage,
        options: ImageEditOptions,
    ) -> Result<GenerationResponse, StudioError> {
        let form = Form::new().part("image", file_part(image)?);
        let form = with_options(form, &options.merged_over_defaults());

        let result = self.send_form("images/variations", form).await;
        self.apply_policy(ImageOperation::Variation, result)
    }
}
