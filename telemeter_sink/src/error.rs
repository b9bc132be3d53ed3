use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Measurement '{0}' has no fields")]
    NoFields(String),

    #[error("Measurement '{measurement}' cannot be encoded: {reason}")]
    InvalidLine { measurement: String, reason: String },

    #[error("Encoded line is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("A flush interval requires a running tokio runtime")]
    NoRuntime,

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SinkError>;
