use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Log line does not match the expected layout")]
    MalformedLogLine,

    #[error("Invalid log timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Unknown download status: {0}")]
    UnknownStatus(String),
}
