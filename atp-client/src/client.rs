//! The protocol client state machine

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use atp_protocol::{
    write_message, FrameReader, HelloMessage, StartWorkMessage, WorkDoneMessage,
};
use atp_schema::{Schema, SchemaError, StepSchema, Type};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::signal::{forward_outbound, Input};
use crate::version::{ProtocolVersion, WorkLoop};

/// Where a client is in the plugin lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Init,
    AwaitingHello,
    VersionBound,
    Idle,
    Executing,
    Completed,
    Failed,
}

/// Drives one plugin over one channel: handshake, schema, step executions.
///
/// A step can only be executed once, but signals can be exchanged until the
/// step is done.
pub struct Client<R, W> {
    reader: FrameReader<R>,
    writer: Arc<Mutex<W>>,
    config: ClientConfig,
    state: ClientState,
    version: Option<ProtocolVersion>,
    work_loop: Option<Box<dyn WorkLoop<R>>>,
    schema: Option<Schema>,
    executed: HashSet<String>,
}

impl<R, W> fmt::Debug for Client<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("version", &self.version)
            .field("executed", &self.executed)
            .finish_non_exhaustive()
    }
}

impl<S> Client<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Client over a single duplex stream
    pub fn from_stream(stream: S, config: ClientConfig) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::with_config(reader, writer, config)
    }
}

impl<R, W> Client<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ClientConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: ClientConfig) -> Self {
        Self {
            reader: FrameReader::with_limit(reader, config.max_message_bytes),
            writer: Arc::new(Mutex::new(writer)),
            config,
            state: ClientState::Init,
            version: None,
            work_loop: None,
            schema: None,
            executed: HashSet::new(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Version agreed on in the hello, if any
    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    /// Schema read from the plugin, if any
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Queue sized from the client configuration, for signals in either direction
    pub fn signal_channel(&self) -> (mpsc::Sender<Input>, mpsc::Receiver<Input>) {
        mpsc::channel(self.config.signal_queue_capacity.max(1))
    }

    /// Start the plugin and read its hello.
    ///
    /// On success the negotiated version is fixed for the rest of the
    /// client's life.
    pub async fn read_schema(&mut self) -> Result<Schema> {
        if self.state != ClientState::Init {
            return Err(ClientError::InvalidState(format!(
                "schema can only be read once, client is {:?}",
                self.state
            )));
        }

        debug!("Reading plugin schema...");
        self.state = ClientState::AwaitingHello;

        let result = self.handshake().await;
        if let Err(e) = &result {
            error!("Failed to read plugin schema: {}", e);
            self.state = ClientState::Failed;
        }
        result
    }

    async fn handshake(&mut self) -> Result<Schema> {
        {
            let mut writer = self.writer.lock().await;
            write_message(&mut *writer, &Value::Null)
                .await
                .map_err(ClientError::encode("start signal"))?;
        }

        let hello: HelloMessage = self
            .reader
            .read_message()
            .await
            .map_err(ClientError::decode("hello message"))?;
        debug!("Hello message read, plugin speaks protocol version {}", hello.version);

        let version = ProtocolVersion::try_from(hello.version)?;
        self.state = ClientState::VersionBound;

        let schema = Schema::from_value(hello.schema).map_err(ClientError::SchemaDefinition)?;
        debug!("Schema unserialization complete, {} step(s)", schema.steps().len());

        self.version = Some(version);
        self.work_loop = Some(version.work_loop());
        self.schema = Some(schema.clone());
        self.state = ClientState::Idle;
        Ok(schema)
    }

    /// Run a step and return its output id and data.
    ///
    /// Signals from `received_signals` are written to the plugin while the
    /// step runs; signals the plugin emits go to `emitted_signals`, which is
    /// dropped before this returns.
    ///
    /// Emitted signals are sent with backpressure: drain the receiving end
    /// concurrently with this call, otherwise reading stalls once the queue
    /// is full.
    pub async fn execute(
        &mut self,
        input: Input,
        received_signals: Option<mpsc::Receiver<Input>>,
        emitted_signals: Option<mpsc::Sender<Input>>,
    ) -> Result<(String, Value)> {
        let (version, step) = self.prepare(&input.id)?;
        let step_id = input.id;
        debug!("Executing plugin step {}...", step_id);

        let config = Type::serialize(step.input(), &input.data)
            .map_err(|source| ClientError::InvalidInput {
                step: step_id.clone(),
                source,
            })?;

        self.executed.insert(step_id.clone());
        self.state = ClientState::Executing;

        {
            let mut writer = self.writer.lock().await;
            let start = StartWorkMessage {
                step_id: step_id.clone(),
                config,
            };
            if let Err(e) = write_message(&mut *writer, &start).await {
                error!("Step {} failed to write start work message: {}", step_id, e);
                self.state = ClientState::Failed;
                return Err(ClientError::Encode {
                    context: "start work message",
                    source: e,
                });
            }
        }
        debug!("Step {} started, waiting for response...", step_id);

        let (done_tx, done_rx) = oneshot::channel();
        let outbound = received_signals.map(|signals| {
            tokio::spawn(forward_outbound(
                self.writer.clone(),
                step.clone(),
                version,
                signals,
                done_rx,
            ))
        });

        let result = match &self.work_loop {
            Some(work_loop) => {
                work_loop
                    .run(&mut self.reader, &step, emitted_signals.as_ref())
                    .await
            }
            None => Err(ClientError::InvalidState("no protocol version negotiated".to_string())),
        };

        let _ = done_tx.send(());
        if let Some(outbound) = outbound {
            if let Err(e) = outbound.await {
                error!("Step {} signal writer failed: {}", step_id, e);
            }
        }
        drop(emitted_signals);

        match result {
            Ok(done) => {
                self.state = ClientState::Completed;
                Ok(finish(&step_id, done))
            }
            Err(e) => {
                error!("Step {} failed: {}", step_id, e);
                self.state = ClientState::Failed;
                Err(e)
            }
        }
    }

    fn prepare(&self, step_id: &str) -> Result<(ProtocolVersion, StepSchema)> {
        let (Some(version), Some(schema)) = (self.version, &self.schema) else {
            return Err(ClientError::InvalidState(format!(
                "read the plugin schema before executing a step, client is {:?}",
                self.state
            )));
        };
        if self.state == ClientState::Executing {
            return Err(ClientError::InvalidState("a step is already executing".to_string()));
        }

        let step = schema.step(step_id).map_err(|e| match e {
            SchemaError::NoSuchStep { step } => ClientError::NoSuchStep(step),
            other => ClientError::SchemaDefinition(other),
        })?;
        if self.executed.contains(step_id) {
            return Err(ClientError::StepAlreadyExecuted(step_id.to_string()));
        }
        Ok((version, step.clone()))
    }

    /// Shut the write half down, signalling end of input to the plugin
    pub async fn close(&mut self) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

fn finish(step_id: &str, done: WorkDoneMessage) -> (String, Value) {
    if !done.step_id.is_empty() && done.step_id != step_id {
        warn!(
            "Step {} received work done message for step {}",
            step_id, done.step_id
        );
    }
    info!("Step {} completed with output ID '{}'.", step_id, done.output_id);

    for line in done.debug_logs.lines() {
        if !line.trim().is_empty() {
            debug!("Step {} debug: {}", step_id, line);
        }
    }
    (done.output_id, done.output_data)
}
