use atp_client::{Client, ClientConfig, ClientError, ClientState, Input, ProtocolVersion};
use atp_protocol::{
    write_message, CodecError, FrameReader, HelloMessage, MessageKind, RuntimeEnvelope,
    RuntimeMessage, SignalMessage, StartWorkMessage, WorkDoneMessage,
};
use atp_schema::{
    ObjectSchema, PropertySchema, Schema, ScopeSchema, SignalSchema, StepOutputSchema, StepSchema,
    TypeSchema,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

type TestClient = Client<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Plugin side of the channel, scripted by each test
struct FakePlugin {
    reader: FrameReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakePlugin {
    async fn send<T: Serialize>(&mut self, message: &T) {
        write_message(&mut self.writer, message).await.unwrap();
    }

    async fn recv<T: DeserializeOwned>(&mut self) -> T {
        self.reader.read_message().await.unwrap()
    }

    async fn hello(&mut self, version: i64, schema: Value) {
        let start: Value = self.recv().await;
        assert!(start.is_null());
        self.send(&HelloMessage { version, schema }).await;
    }

    async fn work_done_v2(&mut self, output_id: &str, output_data: Value) {
        self.send(&RuntimeMessage::work_done(WorkDoneMessage {
            step_id: "greet".to_string(),
            output_id: output_id.to_string(),
            output_data,
            debug_logs: String::new(),
        }))
        .await;
    }
}

fn connect() -> (TestClient, FakePlugin) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let (client_io, plugin_io) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(plugin_io);
    (
        Client::from_stream(client_io, ClientConfig::default()),
        FakePlugin {
            reader: FrameReader::new(reader),
            writer,
        },
    )
}

fn scope(id: &str, properties: Vec<(&str, PropertySchema)>) -> ScopeSchema {
    ScopeSchema::new(ObjectSchema::new(id, properties), [])
}

fn plugin_schema() -> Schema {
    let input = scope(
        "GreetInput",
        vec![
            ("name", PropertySchema::required(TypeSchema::string())),
            (
                "greeting",
                PropertySchema::new(TypeSchema::string()).with_default(json!("Hello")),
            ),
        ],
    );
    let output = scope(
        "GreetOutput",
        vec![("message", PropertySchema::required(TypeSchema::string()))],
    );
    let pause = SignalSchema::new(
        "pause",
        scope("Pause", vec![("seconds", PropertySchema::required(TypeSchema::integer()))]),
    );
    let progress = SignalSchema::new(
        "progress",
        scope("Progress", vec![("percent", PropertySchema::required(TypeSchema::integer()))]),
    );

    Schema::new([StepSchema::new(
        "greet",
        input,
        [("success".to_string(), StepOutputSchema::new(output))],
    )
    .with_signal_handlers([pause])
    .with_signal_emitters([progress])])
}

async fn ready(version: i64) -> (TestClient, FakePlugin) {
    let (mut client, mut plugin) = connect();
    let (schema, ()) = tokio::join!(
        client.read_schema(),
        plugin.hello(version, plugin_schema().to_value().unwrap())
    );
    assert_eq!(schema.unwrap(), plugin_schema());
    (client, plugin)
}

fn greet() -> Input {
    Input::new("greet", json!({"name": "Ada"}))
}

#[tokio::test]
async fn handshake_negotiates_supported_versions() {
    let (client, _plugin) = ready(1).await;
    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::V1));
    assert_eq!(client.state(), ClientState::Idle);

    let (client, _plugin) = ready(2).await;
    assert_eq!(client.negotiated_version(), Some(ProtocolVersion::V2));
    assert!(client.schema().unwrap().step("greet").is_ok());
}

#[tokio::test]
async fn unsupported_version_is_fatal() {
    let (mut client, mut plugin) = connect();
    let (result, ()) = tokio::join!(
        client.read_schema(),
        plugin.hello(3, plugin_schema().to_value().unwrap())
    );

    assert!(matches!(
        result.unwrap_err(),
        ClientError::ProtocolVersion { version: 3, min: 1, max: 2 }
    ));
    assert_eq!(client.negotiated_version(), None);
    assert_eq!(client.state(), ClientState::Failed);

    let err = client.execute(greet(), None, None).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState(_)));
}

#[tokio::test]
async fn invalid_schema_is_rejected() {
    let (mut client, mut plugin) = connect();
    let mut schema = plugin_schema().to_value().unwrap();
    schema["steps"]["greet"]["input"]["root"] = json!("Missing");

    let (result, ()) = tokio::join!(client.read_schema(), plugin.hello(2, schema));
    assert!(matches!(result.unwrap_err(), ClientError::SchemaDefinition(_)));
}

#[tokio::test]
async fn execute_requires_schema() {
    let (mut client, _plugin) = connect();
    let err = client.execute(greet(), None, None).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidState(_)));
    assert_eq!(client.state(), ClientState::Init);
}

#[tokio::test]
async fn v1_returns_bare_work_done() {
    let (mut client, mut plugin) = ready(1).await;

    let script = async {
        let start: StartWorkMessage = plugin.recv().await;
        assert_eq!(start.step_id, "greet");
        assert_eq!(start.config, json!({"name": "Ada", "greeting": "Hello"}));

        plugin
            .send(&WorkDoneMessage {
                step_id: "greet".to_string(),
                output_id: "success".to_string(),
                output_data: json!({"message": "Hello Ada"}),
                debug_logs: "resolving name\n\n  \ngreeting sent\n".to_string(),
            })
            .await;
    };

    let (result, ()) = tokio::join!(client.execute(greet(), None, None), script);
    assert_eq!(
        result.unwrap(),
        ("success".to_string(), json!({"message": "Hello Ada"}))
    );
    assert_eq!(client.state(), ClientState::Completed);
}

#[tokio::test]
async fn v2_writes_signals_in_order_and_nothing_after_work_done() {
    let (mut client, mut plugin) = ready(2).await;
    let (signals_tx, signals_rx) = client.signal_channel();
    for seconds in 1..=3 {
        signals_tx
            .send(Input::new("pause", json!({"seconds": seconds})))
            .await
            .unwrap();
    }

    let script = async {
        let _start: StartWorkMessage = plugin.recv().await;
        for seconds in 1..=3 {
            let envelope: RuntimeEnvelope = plugin.recv().await;
            assert_eq!(envelope.id, MessageKind::Signal);
            let signal: SignalMessage = envelope.payload().unwrap();
            assert_eq!(signal.step_id, "greet");
            assert_eq!(signal.signal_id, "pause");
            assert_eq!(signal.data, json!({"seconds": seconds}));
        }
        plugin.work_done_v2("success", json!({"message": "Hello Ada"})).await;
    };

    let (result, ()) = tokio::join!(client.execute(greet(), Some(signals_rx), None), script);
    assert_eq!(result.unwrap().0, "success");

    // The writer task is gone, so the queue is closed
    assert!(signals_tx
        .send(Input::new("pause", json!({"seconds": 4})))
        .await
        .is_err());

    client.close().await.unwrap();
    let end = plugin.reader.read_message::<Value>().await.unwrap_err();
    assert!(matches!(end, CodecError::ConnectionClosed));
}

#[tokio::test]
async fn v1_drops_caller_signals() {
    let (mut client, mut plugin) = ready(1).await;
    let (signals_tx, signals_rx) = client.signal_channel();
    for seconds in 1..=2 {
        signals_tx
            .send(Input::new("pause", json!({"seconds": seconds})))
            .await
            .unwrap();
    }

    let script = async {
        let _start: StartWorkMessage = plugin.recv().await;
        // Let the signal writer drain the queue before the step ends
        while signals_tx.capacity() < signals_tx.max_capacity() {
            tokio::task::yield_now().await;
        }
        plugin
            .send(&WorkDoneMessage {
                step_id: "greet".to_string(),
                output_id: "success".to_string(),
                output_data: json!({"message": "Hello Ada"}),
                debug_logs: String::new(),
            })
            .await;
    };

    let (result, ()) = tokio::join!(client.execute(greet(), Some(signals_rx), None), script);
    assert_eq!(result.unwrap().0, "success");

    client.close().await.unwrap();
    let end = plugin.reader.read_message::<Value>().await.unwrap_err();
    assert!(matches!(end, CodecError::ConnectionClosed));
}

#[tokio::test]
async fn writing_to_a_gone_plugin_is_an_encode_error() {
    let (mut client, plugin) = connect();
    drop(plugin);
    let err = client.read_schema().await.unwrap_err();
    assert!(matches!(err, ClientError::Encode { context: "start signal", .. }));
    assert_eq!(client.state(), ClientState::Failed);

    let (mut client, plugin) = ready(2).await;
    drop(plugin);
    let err = client.execute(greet(), None, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Encode { context: "start work message", .. }));
    assert_eq!(client.state(), ClientState::Failed);
}

#[tokio::test]
async fn v2_forwards_emitted_signals_and_skips_unknown_kinds() {
    let (mut client, mut plugin) = ready(2).await;
    let (emitted_tx, mut emitted_rx) = client.signal_channel();

    let script = async {
        let _start: StartWorkMessage = plugin.recv().await;
        plugin
            .send(&RuntimeMessage {
                id: MessageKind::Unknown("heartbeat".to_string()),
                data: 1,
            })
            .await;
        for percent in [json!(50), json!("half")] {
            plugin
                .send(&RuntimeMessage::signal(SignalMessage {
                    step_id: "greet".to_string(),
                    signal_id: "progress".to_string(),
                    data: json!({"percent": percent}),
                }))
                .await;
        }
        plugin
            .send(&RuntimeMessage::signal(SignalMessage {
                step_id: "greet".to_string(),
                signal_id: "log".to_string(),
                data: json!("free form"),
            }))
            .await;
        plugin.work_done_v2("success", json!({"message": "Hello Ada"})).await;
    };

    let (result, ()) = tokio::join!(
        client.execute(greet(), None, Some(emitted_tx)),
        script
    );
    assert!(result.is_ok());

    // The invalid progress signal is dropped, the undeclared one passes through
    assert_eq!(
        emitted_rx.recv().await,
        Some(Input::new("progress", json!({"percent": 50})))
    );
    assert_eq!(
        emitted_rx.recv().await,
        Some(Input::new("log", json!("free form")))
    );
    assert_eq!(emitted_rx.recv().await, None);
}

#[tokio::test]
async fn steps_are_checked_before_starting() {
    let (mut client, mut plugin) = ready(2).await;

    let err = client
        .execute(Input::new("wave", json!({})), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoSuchStep(ref step) if step == "wave"));

    let err = client
        .execute(Input::new("greet", json!({"name": 5})), None, None)
        .await
        .unwrap_err();
    match err {
        ClientError::InvalidInput { step, source } => {
            assert_eq!(step, "greet");
            assert_eq!(source.path(), ["name".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let script = async {
        let _start: StartWorkMessage = plugin.recv().await;
        plugin.work_done_v2("success", json!({"message": "Hi"})).await;
    };
    let (result, ()) = tokio::join!(client.execute(greet(), None, None), script);
    assert!(result.is_ok());

    let err = client.execute(greet(), None, None).await.unwrap_err();
    assert!(matches!(err, ClientError::StepAlreadyExecuted(ref step) if step == "greet"));
}

#[tokio::test]
async fn plugin_hanging_up_mid_step_is_a_decode_error() {
    let (mut client, mut plugin) = ready(2).await;

    let script = async move {
        let _start: StartWorkMessage = plugin.recv().await;
        drop(plugin);
    };

    let (result, ()) = tokio::join!(client.execute(greet(), None, None), script);
    let err = result.unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
    assert!(err.is_connection_closed());
    assert_eq!(client.state(), ClientState::Failed);
}
