use med_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("catalog error: {0}")]
    Catalog(String),
}
