use thiserror::Error;

#[derive(Debug, Error)]
pub enum DevbotError {
    #[error("malformed command '{text}': expected {usage}")]
    MalformedCommand { text: String, usage: &'static str },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{service} error: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    #[error("{0} integration is disabled")]
    Disabled(&'static str),

    #[error("invalid page reference: {0}")]
    InvalidPageRef(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DevbotError {
    pub fn service(service: &'static str, message: impl Into<String>) -> Self {
        DevbotError::Service {
            service,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DevbotError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DevbotError>;
