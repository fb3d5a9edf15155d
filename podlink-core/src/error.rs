use podlink_types::{ItemId, ModelError, ParamId, PresetId, QueryTarget};
use thiserror::Error;

/// Failure of the channel to the device. Every transport error is treated as
/// a lost connection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(String),

    #[error("connection closed")]
    Closed,

    #[error("timed out waiting for the device")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => TransportError::Closed,
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => TransportError::Timeout,
            _ => TransportError::Io(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PodError {
    #[error("device '{0}' not found")]
    DeviceNotFound(String),

    #[error("could not connect to device: {0}")]
    ConnectionFailed(String),

    #[error("no device is bound")]
    NotStarted,

    #[error("already bound to device '{current}'")]
    AlreadyBound { current: String },

    #[error("a structural command is outstanding")]
    DeviceBusy,

    #[error("value {value} outside {min}..={max}")]
    ParameterOutOfRange { value: f32, min: f32, max: f32 },

    #[error("unknown type '{model}' in category '{category}'")]
    UnknownType { category: String, model: String },

    #[error("no board item {0}")]
    UnknownSlot(ItemId),

    #[error("no parameter {param} (item {item:?})")]
    UnknownParameter { item: Option<ItemId>, param: ParamId },

    #[error("no preset {0}")]
    UnknownPreset(PresetId),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("device binding was released")]
    DeviceStopped,

    #[error("device rejected the command: {0}")]
    DeviceRejected(String),

    #[error("{} entries could not be refreshed", failed.len())]
    PartialQueryFailure { failed: Vec<QueryTarget> },

    #[error("transport error: {0}")]
    TransportError(#[from] TransportError),

    #[error("unexpected device response, expected {expected}")]
    UnexpectedResponse { expected: &'static str },
}

impl From<ModelError> for PodError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownSlot(item) => PodError::UnknownSlot(item),
            ModelError::UnknownParameter { item, param } => PodError::UnknownParameter { item, param },
            ModelError::ParameterOutOfRange { value, min, max } => {
                PodError::ParameterOutOfRange { value, min, max }
            }
            ModelError::UnknownType { category, model } => PodError::UnknownType { category, model },
            ModelError::InvalidValue(msg) => PodError::InvalidValue(msg),
            ModelError::UnknownPreset(id) => PodError::UnknownPreset(id),
            ModelError::InvalidPosition { position, capacity } => PodError::InvalidValue(format!(
                "position {position} outside board of {capacity} items"
            )),
        }
    }
}

impl PodError {
    /// Whether the error means the binding is gone (as opposed to one command failing).
    pub fn is_fatal(&self) -> bool {
        matches!(self, PodError::TransportError(_) | PodError::DeviceStopped)
    }
}

pub type Result<T> = std::result::Result<T, PodError>;
