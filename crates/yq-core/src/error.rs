use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Client error: {0}")]
    Client(#[from] yq_client::ClientError),

    #[error("Invalid page URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Element is not a {0} container")]
    NotAContainer(&'static str),

    #[error("Unknown instance: {0}")]
    UnknownInstance(String),
}

pub type Result<T> = std::result::Result<T, Error>;
