// src/services/mod.rs
pub mod image_api;
pub mod image_store;

pub use image_api::{ImageApi, OpenAIImageClient};
pub use image_store::{ImageStore, RedisImageStore};
