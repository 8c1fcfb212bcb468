//! Client side of the prediction/history API.

pub mod client;
pub mod upload;

pub use client::{ApiClient, ApiConfig, ApiError, Profile, Registration};
pub use upload::upload_images;
