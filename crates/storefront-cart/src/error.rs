use thiserror::Error;

pub type Result<T> = std::result::Result<T, CartError>;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid currency code: {code:?}")]
    InvalidCurrency { code: String },

    #[error("invalid cart configuration: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    Reactive(#[from] storefront_reactive::ReactiveError),
}

impl CartError {
    #[must_use]
    pub fn invalid_currency(code: impl Into<String>) -> Self {
        Self::InvalidCurrency { code: code.into() }
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
