use thiserror::Error;

pub type Result<T, E = BindingError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// Host vessel is not ready. The manager retries on a later update.
    #[error("cannot attach yet: {0}")]
    UnsupportedContext(String),

    #[error("no such fly-by-wire channel: {0}")]
    UnknownChannel(String),

    #[error("{channel} cannot be set to a {found}, expected {expected}")]
    TypeMismatch {
        channel: &'static str,
        found: &'static str,
        expected: &'static str,
    },

    #[error("unrecognized {setting} setting of {name:?}")]
    InvalidMode { setting: &'static str, name: String },

    #[error("{0}")]
    SituationallyInvalid(String),

    #[error("cannot set navigation mode: there is no target")]
    NoTarget,

    /// The steering authority refused the value it was handed.
    #[error("steering rejected value: {0}")]
    Steering(String),
}
