//! Application state.

use std::sync::Arc;

use reel_pipeline::{Pipeline, PipelineConfig};
use reel_store::{JsonFileStore, VideoStore};

use crate::auth::JwtVerifier;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<Pipeline>,
    pub auth: Arc<JwtVerifier>,
}

impl AppState {
    /// Wrap an existing pipeline.
    pub fn new(config: ApiConfig, pipeline: Arc<Pipeline>) -> Self {
        let auth = Arc::new(JwtVerifier::new(&config.jwt_secret));
        Self {
            config,
            pipeline,
            auth,
        }
    }

    /// Open the record store and build the pipeline against real ffmpeg.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let store = JsonFileStore::open(&config.records_path).await?;
        let pipeline = Pipeline::new(PipelineConfig::from_env(), Arc::new(store));
        tokio::fs::create_dir_all(&config.upload_dir).await?;
        tokio::fs::create_dir_all(&pipeline.config().output_dir).await?;
        Ok(Self::new(config, Arc::new(pipeline)))
    }

    pub fn store(&self) -> &Arc<dyn VideoStore> {
        self.pipeline.store()
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }
}
