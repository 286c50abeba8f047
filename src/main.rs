// src/main.rs
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use log::{info, warn};
use std::sync::Arc;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::AppConfig;
use crate::errors::StudioError;
use crate::handlers::{edit_image, generate_image, image_variation};
use crate::services::{ImageApi, ImageStore, OpenAIImageClient, RedisImageStore};

#[derive(Clone)]
pub struct AppState {
    image_api: Option<Arc<dyn ImageApi>>,
    image_store: Option<Arc<dyn ImageStore>>,
}

impl AppState {
    pub fn new(
        image_api: Option<Arc<dyn ImageApi>>,
        image_store: Option<Arc<dyn ImageStore>>,
    ) -> Self {
        Self {
            image_api,
            image_store,
        }
    }

    /// The upstream client, or a configuration error when no credential was supplied.
    pub fn image_api(&self) -> Result<&Arc<dyn ImageApi>, StudioError> {
        self.image_api.as_ref().ok_or_else(|| {
            warn!("⚠️ OpenAI API key is not configured");
            StudioError::Configuration("OpenAI API key is not configured".to_string())
        })
    }

    pub fn image_store(&self) -> Option<&Arc<dyn ImageStore>> {
        self.image_store.as_ref()
    }
}

pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/generate-image", web::post().to(generate_image))
            .route("/edit-image", web::post().to(edit_image))
            .route("/image-variation", web::post().to(image_variation)),
    )
    .route("/health", web::get().to(health_check));
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting image studio...");

    let config = AppConfig::from_env()?;

    let image_api: Option<Arc<dyn ImageApi>> = match &config.openai_api_key {
        Some(key) => Some(Arc::new(OpenAIImageClient::new(
            key.clone(),
            config.openai_base_url.clone(),
            config.failure_policy,
        ))),
        None => {
            warn!("OPENAI_API_KEY is not set, image endpoints will return configuration errors");
            None
        }
    };

    let image_store: Option<Arc<dyn ImageStore>> = match &config.redis_url {
        Some(url) => match RedisImageStore::new(url).await {
            Ok(store) => {
                info!("Image records will be stored in Redis");
                Some(Arc::new(store))
            }
            Err(e) => {
                warn!("Redis unavailable, image records will not be stored: {}", e);
                None
            }
        },
        None => {
            info!("REDIS_URL is not set, image records will not be stored");
            None
        }
    };

    let app_state = AppState::new(image_api, image_store);
    let static_dir = config.static_dir.clone();

    info!(
        "Starting HTTP server on {} (upstream failure policy: {:?})",
        config.server_addr, config.failure_policy
    );

    HttpServer::new(move || {
        let app = App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(api_routes);

        match &static_dir {
            Some(dir) => app.service(actix_files::Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind(config.server_addr)?
    .run()
    .await?;

    Ok(())
}

async fn health_check(data: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "upstream_configured": data.image_api.is_some(),
        "persistence_configured": data.image_store.is_some(),
    }))
}
