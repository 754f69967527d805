use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

pub mod access_log;
pub mod config;
pub mod personalize;
pub mod startup_checks;

pub use config::ConfigError;

/// Settings read from the env file and the process environment. Field names
/// map to the variable names (`PORT`, `HOST`, `IMAGES_DIR`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub server: ServerConfig,
    #[serde(flatten)]
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ServerConfig {
    #[serde(
        default = "config::default_host",
        deserialize_with = "config::from_env_str"
    )]
    pub host: IpAddr,
    #[serde(deserialize_with = "config::from_env_str")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ImagesConfig {
    /// Holds `{name}.jpg` sources and the `generated/` tree
    #[serde(
        rename = "IMAGES_DIR",
        default = "config::default_images_dir",
        deserialize_with = "config::from_env_str"
    )]
    pub directory: PathBuf,
    #[serde(
        default = "config::default_jpeg_quality",
        deserialize_with = "config::jpeg_quality"
    )]
    pub jpeg_quality: u8,
    /// Create `generated/{name}/` on demand instead of requiring it up front
    #[serde(default, deserialize_with = "config::flag")]
    pub create_generated_dirs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: config::default_host(),
                port: 8080,
            },
            images: ImagesConfig {
                directory: config::default_images_dir(),
                jpeg_quality: config::default_jpeg_quality(),
                create_generated_dirs: false,
            },
        }
    }
}

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub personalizer: personalize::SharedPersonalizer,
}

pub async fn create_app(config: Config) -> Router {
    let personalizer = Arc::new(personalize::Personalizer::new(config.images));

    let app_state = AppState { personalizer };

    Router::new()
        .route(
            "/image/{image_name}",
            axum::routing::get(personalize::image_handler),
        )
        .route("/health", axum::routing::get(personalize::health_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(access_log::request_span)
                .on_request(access_log::log_request)
                .on_response(access_log::log_response),
        )
        .with_state(app_state)
}
