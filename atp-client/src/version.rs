//! Protocol versions and their work loops

use atp_protocol::{
    FrameReader, MessageKind, RuntimeEnvelope, SignalMessage, WorkDoneMessage,
    MAX_SUPPORTED_VERSION, MIN_SUPPORTED_VERSION,
};
use atp_schema::StepSchema;
use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::signal::{forward_inbound, Input};

/// Negotiated protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Bare work-done message, no signals
    V1,
    /// Runtime envelopes carrying signals and the work-done message
    V2,
}

impl ProtocolVersion {
    pub fn as_i64(&self) -> i64 {
        match self {
            ProtocolVersion::V1 => 1,
            ProtocolVersion::V2 => 2,
        }
    }

    pub(crate) fn work_loop<R>(&self) -> Box<dyn WorkLoop<R>>
    where
        R: AsyncRead + Unpin + Send,
    {
        match self {
            ProtocolVersion::V1 => Box::new(V1Loop),
            ProtocolVersion::V2 => Box::new(V2Loop),
        }
    }
}

impl TryFrom<i64> for ProtocolVersion {
    type Error = ClientError;

    fn try_from(version: i64) -> Result<Self> {
        match version {
            1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            _ => Err(ClientError::ProtocolVersion {
                version,
                min: MIN_SUPPORTED_VERSION,
                max: MAX_SUPPORTED_VERSION,
            }),
        }
    }
}

/// Reads plugin messages for a running step until it is done
#[async_trait]
pub(crate) trait WorkLoop<R>: Send + Sync {
    async fn run(
        &self,
        reader: &mut FrameReader<R>,
        step: &StepSchema,
        emitted: Option<&mpsc::Sender<Input>>,
    ) -> Result<WorkDoneMessage>;
}

pub(crate) struct V1Loop;

#[async_trait]
impl<R> WorkLoop<R> for V1Loop
where
    R: AsyncRead + Unpin + Send,
{
    async fn run(
        &self,
        reader: &mut FrameReader<R>,
        _step: &StepSchema,
        _emitted: Option<&mpsc::Sender<Input>>,
    ) -> Result<WorkDoneMessage> {
        reader
            .read_message()
            .await
            .map_err(ClientError::decode("work done message"))
    }
}

pub(crate) struct V2Loop;

#[async_trait]
impl<R> WorkLoop<R> for V2Loop
where
    R: AsyncRead + Unpin + Send,
{
    async fn run(
        &self,
        reader: &mut FrameReader<R>,
        step: &StepSchema,
        emitted: Option<&mpsc::Sender<Input>>,
    ) -> Result<WorkDoneMessage> {
        loop {
            let envelope: RuntimeEnvelope = reader
                .read_message()
                .await
                .map_err(ClientError::decode("runtime message"))?;

            match &envelope.id {
                MessageKind::WorkDone => {
                    return envelope
                        .payload()
                        .map_err(ClientError::decode("work done message"));
                }
                MessageKind::Signal => {
                    let signal: SignalMessage = envelope
                        .payload()
                        .map_err(ClientError::decode("signal message"))?;
                    debug!("Step {} emitted signal {}", step.id(), signal.signal_id);
                    forward_inbound(step, signal, emitted).await;
                }
                MessageKind::Unknown(kind) => {
                    warn!("Step {} sent unknown message type: {}", step.id(), kind);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_versions_are_accepted() {
        assert_eq!(ProtocolVersion::try_from(1).unwrap(), ProtocolVersion::V1);
        assert_eq!(ProtocolVersion::try_from(2).unwrap().as_i64(), 2);

        for version in [0, 3, -1] {
            let err = ProtocolVersion::try_from(version).unwrap_err();
            assert!(matches!(
                err,
                ClientError::ProtocolVersion { version: v, min: 1, max: 2 } if v == version
            ));
        }
    }
}
