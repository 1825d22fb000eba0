//! Signal exchange while a step runs

use std::sync::Arc;

use atp_protocol::{write_message, RuntimeMessage, SignalMessage};
use atp_schema::{StepSchema, Type};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::version::ProtocolVersion;

/// An identified piece of data: step input or signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    pub data: Value,
}

impl Input {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// Write caller signals to the plugin until the queue closes or the step is done
pub(crate) async fn forward_outbound<W>(
    writer: Arc<Mutex<W>>,
    step: StepSchema,
    version: ProtocolVersion,
    mut signals: mpsc::Receiver<Input>,
    mut done: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let signal = tokio::select! {
            biased;
            _ = &mut done => break,
            signal = signals.recv() => match signal {
                Some(signal) => signal,
                None => break,
            },
        };

        if version == ProtocolVersion::V1 {
            warn!(
                "Step {} cannot receive signal {} over protocol version 1, dropping it",
                step.id(),
                signal.id
            );
            continue;
        }

        let data = match step.signal_handler(&signal.id) {
            Some(handler) => match Type::serialize(handler.data(), &signal.data) {
                Ok(data) => data,
                Err(e) => {
                    error!("Step {} signal {} is invalid, dropping it: {}", step.id(), signal.id, e);
                    continue;
                }
            },
            None => {
                warn!(
                    "Step {} declares no handler for signal {}, sending it unchecked",
                    step.id(),
                    signal.id
                );
                signal.data
            }
        };

        let message = RuntimeMessage::signal(SignalMessage {
            step_id: step.id().to_string(),
            signal_id: signal.id,
            data,
        });

        let mut guard = writer.lock().await;
        if let Err(e) = write_message(&mut *guard, &message).await {
            error!("Step {} failed to write signal message: {}", step.id(), e);
            break;
        }
        debug!("Step {} sent signal {}", step.id(), message.data.signal_id);
    }

    debug!("Step {} signal writer finished", step.id());
}

/// Hand a signal emitted by the plugin to the caller
pub(crate) async fn forward_inbound(
    step: &StepSchema,
    signal: SignalMessage,
    emitted: Option<&mpsc::Sender<Input>>,
) {
    let data = match step.signal_emitter(&signal.signal_id) {
        Some(emitter) => match emitter.data().unserialize(&signal.data) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    "Step {} emitted invalid signal {}, dropping it: {}",
                    step.id(),
                    signal.signal_id,
                    e
                );
                return;
            }
        },
        None => {
            warn!(
                "Step {} emitted undeclared signal {}, passing it on unchecked",
                step.id(),
                signal.signal_id
            );
            signal.data
        }
    };

    let Some(emitted) = emitted else {
        info!(
            "Step {} sent signal {} but nobody is listening",
            step.id(),
            signal.signal_id
        );
        return;
    };

    let signal_id = signal.signal_id;
    if emitted.send(Input::new(signal_id.clone(), data)).await.is_err() {
        warn!(
            "Step {} sent signal {} after the receiver was closed",
            step.id(),
            signal_id
        );
    }
}
