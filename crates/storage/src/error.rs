use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store file: {0}")]
    Malformed(#[from] serde_json::Error),
}
