use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("unknown command profile {0:?} (expected \"slash\" or \"trigger\")")]
    InvalidProfile(String),
}

/// The webhook body could not be turned into a command.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("missing {0}")]
    MalformedRequest(&'static str),

    #[error("undecodable form body: {0}")]
    Undecodable(#[from] serde_urlencoded::de::Error),
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("tracker denied access to the project")]
    ProjectAccessDenied,

    #[error("tracker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected tracker response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    #[error("no Pivotal project URL found")]
    InvalidPairingLink,

    #[error("tracker denied access to the project")]
    ProjectAccessDenied,
}
