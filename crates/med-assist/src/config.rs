use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
///
/// Everything is optional: without a catalog source the loader falls back to
/// the built-in sample set, and without a Groq credential the secondary tier
/// fails deterministically when reached. The two network peers configure
/// themselves (`BackendClientConfig::from_env`, `GroqClientConfig::from_env`).
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP source for the drugs dataset (JSON array of records).
    pub catalog_url: Option<String>,
    /// Filesystem source for the drugs dataset; consulted when no URL is set.
    pub catalog_path: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `DRUG_CATALOG_URL`: HTTP endpoint returning the dataset
    /// - `DRUG_CATALOG_PATH`: local JSON file with the dataset
    pub fn from_env() -> Result<Self, AppError> {
        let catalog_url = std::env::var("DRUG_CATALOG_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let catalog_path = std::env::var("DRUG_CATALOG_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty());

        if let Some(path) = &catalog_path {
            if catalog_url.is_none() && !std::path::Path::new(path).exists() {
                return Err(AppError::Config(format!(
                    "DRUG_CATALOG_PATH does not exist: {path}"
                )));
            }
        }

        Ok(Self {
            catalog_url,
            catalog_path,
        })
    }
}
