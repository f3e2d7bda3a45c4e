use crate::config::KaggleConfig;
use crate::services::fetcher::{DatasetFetcher, KaggleProvider};
use std::sync::Arc;
use tracing::{info, warn};

pub fn setup_fetcher(config: &KaggleConfig) -> Arc<DatasetFetcher> {
    if config.username.is_none() || config.key.is_none() {
        warn!("⚠️  KAGGLE_USERNAME/KAGGLE_KEY not set; downloads are sent unauthenticated");
    }
    info!(
        "📦 Dataset provider: {} (Dataset: {})",
        config.api_base, config.dataset
    );

    let provider = Arc::new(KaggleProvider::new(config.clone()));
    Arc::new(DatasetFetcher::new(provider))
}
