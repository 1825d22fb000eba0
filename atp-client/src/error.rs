//! Client errors

use atp_protocol::CodecError;
use atp_schema::SchemaError;
use thiserror::Error;

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// A message could not be written to the plugin
    #[error("Failed to write {context}: {source}")]
    Encode {
        context: &'static str,
        source: CodecError,
    },

    /// A message from the plugin could not be read or decoded
    #[error("Failed to read or decode {context}: {source}")]
    Decode {
        context: &'static str,
        source: CodecError,
    },

    #[error("Unsupported protocol version {version}, supported versions are {min} to {max}")]
    ProtocolVersion { version: i64, min: i64, max: i64 },

    #[error("Invalid schema received from plugin: {0}")]
    SchemaDefinition(#[source] SchemaError),

    #[error("No such step: {0}")]
    NoSuchStep(String),

    #[error("Step {0} has already been executed")]
    StepAlreadyExecuted(String),

    #[error("Invalid input for step {step}: {source}")]
    InvalidInput { step: String, source: SchemaError },

    /// The call is not allowed in the current client state
    #[error("Invalid client state: {0}")]
    InvalidState(String),
}

impl ClientError {
    pub(crate) fn encode(context: &'static str) -> impl FnOnce(CodecError) -> Self {
        move |source| Self::Encode { context, source }
    }

    pub(crate) fn decode(context: &'static str) -> impl FnOnce(CodecError) -> Self {
        move |source| Self::Decode { context, source }
    }

    /// Whether the plugin closed the channel
    pub fn is_connection_closed(&self) -> bool {
        matches!(
            self,
            Self::Encode {
                source: CodecError::ConnectionClosed,
                ..
            } | Self::Decode {
                source: CodecError::ConnectionClosed,
                ..
            }
        )
    }
}
