//! Host bridge end-to-end: JSON lines in, responses and engine events out.

use std::sync::Arc;
use std::time::Duration;

use parley::config::EngineConfig;
use parley::history::InMemoryHistoryStore;
use parley::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use parley::host::stdio::run_bridge;
use parley::llm::providers::openai::{OpenAiAdapter, OpenAiConfig};
use parley::llm::tools::ToolRegistry;
use parley::pipeline::{ConversationCoordinator, CoordinatorParts, SpeakQueue};
use parley::session::SessionStatus;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One line read back from the bridge.
#[derive(Debug)]
enum Line {
    Response(ResponseEnvelope),
    Event(EventEnvelope),
}

struct Harness {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    bridge: tokio::task::JoinHandle<parley::Result<()>>,
    coordinator: Arc<ConversationCoordinator>,
}

impl Harness {
    async fn start(server: &MockServer) -> Self {
        let mut config = EngineConfig::default();
        config.llm.base_url = format!("{}/v1", server.uri());
        config.llm.api_key = "k".into();
        config.speech.audio_enabled = false;

        let backend = OpenAiAdapter::new(
            OpenAiConfig::new("k").with_base_url(config.llm.base_url.as_str()),
        )
        .unwrap_or_else(|e| panic!("adapter: {e}"));
        let parts = CoordinatorParts {
            backend: Arc::new(backend),
            registry: Arc::new(ToolRegistry::new()),
            history: Arc::new(InMemoryHistoryStore::new(40)),
            memory: None,
            voice: None,
            log: None,
        };
        let session = Arc::new(SessionStatus::new(false));
        let queue = Arc::new(SpeakQueue::new(Arc::clone(&session)));
        let coordinator = Arc::new(ConversationCoordinator::new(config, session, queue, parts));

        let (input, bridge_in) = tokio::io::duplex(64 * 1024);
        let (bridge_out, output) = tokio::io::duplex(64 * 1024);
        let bridge = tokio::spawn(run_bridge(
            BufReader::new(bridge_in),
            bridge_out,
            Arc::clone(&coordinator),
            coordinator.subscribe(),
            Duration::from_secs(3600),
        ));

        Self {
            input,
            output: BufReader::new(output).lines(),
            bridge,
            coordinator,
        }
    }

    async fn send_raw(&mut self, line: &str) {
        self.input
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap_or_else(|e| panic!("write: {e}"));
    }

    async fn send(&mut self, id: &str, command: CommandName, payload: serde_json::Value) {
        let envelope = CommandEnvelope::new(id, command, payload);
        let line = serde_json::to_string(&envelope).unwrap_or_else(|e| panic!("encode: {e}"));
        self.send_raw(&line).await;
    }

    async fn next_line(&mut self) -> Line {
        let raw = tokio::time::timeout(Duration::from_secs(5), self.output.next_line())
            .await
            .unwrap_or_else(|_| panic!("bridge went quiet"))
            .unwrap_or_else(|e| panic!("read: {e}"))
            .unwrap_or_else(|| panic!("bridge closed its output"));
        let value: serde_json::Value =
            serde_json::from_str(&raw).unwrap_or_else(|e| panic!("bad json {raw}: {e}"));
        if value.get("event").is_some() {
            Line::Event(serde_json::from_value(value).unwrap_or_else(|e| panic!("event: {e}")))
        } else {
            Line::Response(serde_json::from_value(value).unwrap_or_else(|e| panic!("resp: {e}")))
        }
    }

    async fn response(&mut self, request_id: &str) -> ResponseEnvelope {
        loop {
            if let Line::Response(resp) = self.next_line().await
                && resp.request_id == request_id
            {
                return resp;
            }
        }
    }

    async fn event(&mut self, name: &str) -> EventEnvelope {
        loop {
            if let Line::Event(event) = self.next_line().await
                && event.event == name
            {
                return event;
            }
        }
    }
}

fn answer_sse(text: &str) -> ResponseTemplate {
    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
        json!({"choices": [{"delta": {"content": text}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}],
               "usage": {"prompt_tokens": 12, "completion_tokens": 3}}),
    );
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn ping_toggle_and_stop() {
    let server = MockServer::start().await;
    let mut h = Harness::start(&server).await;

    h.send("p1", CommandName::HostPing, json!({})).await;
    assert_eq!(h.response("p1").await.payload["pong"], true);

    h.send("t1", CommandName::ToggleListening, json!({})).await;
    let resp = h.response("t1").await;
    assert!(resp.ok);
    assert_eq!(resp.payload["on"], true);
    assert!(h.coordinator.session().is_listening());

    h.send("s1", CommandName::RuntimeStatus, json!({})).await;
    let status = h.response("s1").await;
    assert_eq!(status.payload["is_listening"], true);
    assert_eq!(status.payload["is_audio_enabled"], false);

    h.send("x", CommandName::RuntimeStop, json!({})).await;
    assert!(h.response("x").await.ok);
    let result = tokio::time::timeout(Duration::from_secs(5), h.bridge)
        .await
        .unwrap_or_else(|_| panic!("bridge did not stop"));
    assert!(matches!(result, Ok(Ok(()))));
}

#[tokio::test]
async fn malformed_lines_get_parse_errors() {
    let server = MockServer::start().await;
    let mut h = Harness::start(&server).await;

    h.send_raw("{not json").await;
    let resp = h.response("parse-error").await;
    assert!(!resp.ok);

    h.send("e1", CommandName::SendPrompt, json!({"text": ""})).await;
    let resp = h.response("e1").await;
    assert!(!resp.ok);
    assert!(resp.error.unwrap_or_default().contains("payload.text"));
}

#[tokio::test]
async fn prompt_streams_engine_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(answer_sse("Hello from the engine"))
        .mount(&server)
        .await;
    let mut h = Harness::start(&server).await;

    h.send("q1", CommandName::SendPrompt, json!({"text": "hi"}))
        .await;
    assert_eq!(h.response("q1").await.payload["accepted"], true);

    let started = h.event("conversation.turn_started").await;
    assert_eq!(started.payload["trigger"], "text");

    let finished = h.event("conversation.turn_finished").await;
    assert_eq!(finished.payload["stop"], "done");
    assert_eq!(finished.payload["rounds"], 1);
    assert_eq!(finished.payload["usage"]["prompt_tokens"], 12);
}
