use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserClientError>;

#[derive(Debug, Error)]
pub enum BrowserClientError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Failed to navigate to {url}: {details}")]
    Navigate { url: String, details: String },

    #[error("Session error: {0}")]
    Session(String),
}
