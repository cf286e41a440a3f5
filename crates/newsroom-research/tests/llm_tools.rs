//! Tool-use conversation and batch triage against a scripted LLM server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use newsroom_core::SourceType;
use newsroom_research::conversation::{run_conversation, ConversationLimits, ToolHandler};
use newsroom_research::llm::{Message, MessageRequest, ToolDefinition};
use newsroom_research::{
    CrawlClient, CrawlRateLimiter, DiscoveredItem, LlmClient, PublicationContext, TriageSettings, Triager,
    Verdict,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers successive requests with successive bodies, repeating the last.
struct Scripted {
    bodies: Vec<Value>,
    served: AtomicUsize,
}

impl Scripted {
    fn new(bodies: Vec<Value>) -> Self {
        Self {
            bodies,
            served: AtomicUsize::new(0),
        }
    }
}

impl Respond for Scripted {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.served.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .get(n)
            .or_else(|| self.bodies.last())
            .cloned()
            .unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(body)
    }
}

fn tool_use(id: &str, url: &str) -> Value {
    json!({
        "content": [
            { "type": "text", "text": "Let me check that page." },
            { "type": "tool_use", "id": id, "name": "fetch_page", "input": { "url": url } }
        ],
        "stop_reason": "tool_use"
    })
}

fn text(body: &str) -> Value {
    json!({ "content": [{ "type": "text", "text": body }], "stop_reason": "end_turn" })
}

fn http() -> reqwest::Client {
    newsroom_research::build_http_client(5, "newsroom-test").expect("client")
}

async fn mount_llm(server: &MockServer, bodies: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "llm-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(Scripted::new(bodies))
        .mount(server)
        .await;
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).expect("request body is JSON"))
        .collect()
}

struct EchoTool {
    calls: AtomicUsize,
}

#[async_trait]
impl ToolHandler for EchoTool {
    async fn handle(&self, name: &str, input: &Value) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("{name} -> {}", input["url"].as_str().unwrap_or_default())
    }
}

fn conversation_request() -> MessageRequest {
    MessageRequest {
        model: "triage-model".into(),
        max_tokens: 256,
        system: Some("classify".into()),
        messages: vec![Message::user_text("[]")],
        tools: vec![ToolDefinition {
            name: "fetch_page".into(),
            description: "fetch".into(),
            input_schema: json!({ "type": "object" }),
        }],
        tool_choice: None,
    }
}

#[tokio::test]
async fn conversation_answers_tool_calls_then_returns_text() {
    let server = MockServer::start().await;
    mount_llm(
        &server,
        vec![tool_use("call_1", "https://wire.example/a"), text("[{\"index\":0}]")],
    )
    .await;

    let llm = LlmClient::new(http(), Some("llm-key".into()), &server.uri()).expect("client");
    let tool = EchoTool {
        calls: AtomicUsize::new(0),
    };
    let limits = ConversationLimits {
        max_turns: 3,
        exhausted_notice: "[done]".into(),
    };

    let outcome = run_conversation(&llm, conversation_request(), &limits, &tool)
        .await
        .expect("conversation should finish");

    assert_eq!(outcome.text, "[{\"index\":0}]");
    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.tool_calls, 1);
    assert!(!outcome.forced_final);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["tool_choice"]["type"], "auto");
    let second = bodies[1]["messages"].as_array().expect("messages");
    assert_eq!(second.len(), 3);
    assert_eq!(second[1]["role"], "assistant");
    assert_eq!(second[2]["content"][0]["type"], "tool_result");
    assert_eq!(second[2]["content"][0]["tool_use_id"], "call_1");
    assert_eq!(second[2]["content"][0]["content"], "fetch_page -> https://wire.example/a");
}

#[tokio::test]
async fn conversation_forces_final_answer_when_turns_run_out() {
    let server = MockServer::start().await;
    mount_llm(
        &server,
        vec![
            tool_use("call_1", "https://wire.example/a"),
            tool_use("call_2", "https://wire.example/b"),
            text("final"),
        ],
    )
    .await;

    let llm = LlmClient::new(http(), Some("llm-key".into()), &server.uri()).expect("client");
    let tool = EchoTool {
        calls: AtomicUsize::new(0),
    };
    let limits = ConversationLimits {
        max_turns: 2,
        exhausted_notice: "[No more fetches]".into(),
    };

    let outcome = run_conversation(&llm, conversation_request(), &limits, &tool)
        .await
        .expect("conversation should finish");

    assert_eq!(outcome.text, "final");
    assert_eq!(outcome.turns, 3);
    assert!(outcome.forced_final);
    assert_eq!(outcome.tool_calls, 1, "second call answered with the notice");

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[1]["tool_choice"]["type"], "auto");
    assert_eq!(bodies[2]["tool_choice"]["type"], "none");
    let last_message = bodies[2]["messages"].as_array().and_then(|m| m.last()).cloned().expect("message");
    assert_eq!(last_message["content"][0]["content"], "[No more fetches]");
}

fn settings(fetch_budget: usize) -> TriageSettings {
    TriageSettings {
        model: "triage-model".into(),
        batch_size: 10,
        fetch_budget,
        max_concurrency: 2,
        rate_limit_delay: Duration::ZERO,
        max_age_days: 90,
    }
}

fn publication() -> PublicationContext {
    PublicationContext {
        id: 1,
        name: "Grain Ledger".into(),
        industry_description: Some("Grain trading, elevators and export logistics".into()),
        reader_personas: Some("Elevator managers".into()),
        publication_domain: None,
        is_active: true,
    }
}

fn crawl(base_url: &str, key: Option<&str>) -> Arc<CrawlClient> {
    Arc::new(
        CrawlClient::new(
            http(),
            key.map(str::to_string),
            base_url,
            Arc::new(CrawlRateLimiter::new(Duration::ZERO)),
        )
        .expect("client"),
    )
}

#[tokio::test]
async fn triage_fetches_a_page_and_maps_verdicts_by_index() {
    let llm_server = MockServer::start().await;
    let crawl_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "markdown": "Upcoming webinar registration form.", "metadata": {} }
        })))
        .expect(1)
        .mount(&crawl_server)
        .await;
    mount_llm(
        &llm_server,
        vec![
            tool_use("call_1", "https://wire.example/events/webinar"),
            text(
                "```json\n[\
                 {\"index\": 1, \"verdict\": \"not_news\", \"reasoning\": \"event page\", \"published_date\": null},\
                 {\"index\": 0, \"verdict\": \"relevant_news\", \"reasoning\": \"export data\", \"published_date\": \"2026-10-17\"}\
                 ]\n```",
            ),
        ],
    )
    .await;

    let triager = Triager::new(
        Arc::new(LlmClient::new(http(), Some("llm-key".into()), &llm_server.uri()).expect("client")),
        crawl(&crawl_server.uri(), Some("crawl-key")),
        settings(1),
    );
    let items = vec![
        DiscoveredItem::new("https://wire.example/markets/wheat-exports-climb")
            .with_title(Some("Wheat exports climb 12%".into())),
        DiscoveredItem::new("https://wire.example/events/webinar").with_title(Some("Webinar".into())),
        DiscoveredItem::new("https://reports.example.gov/stocks.pdf?angle=1"),
    ];
    let types = vec![
        Some(SourceType::Feed),
        Some(SourceType::Site),
        Some(SourceType::StructuredDocument),
    ];

    let verdicts = triager.classify(&items, &types, &publication()).await;

    assert_eq!(verdicts.len(), 3);
    let first = verdicts[0].as_ref().expect("classified");
    assert_eq!(first.verdict, Verdict::Relevant);
    assert_eq!(first.reasoning, "export data");
    assert_eq!(
        first.published_date.map(|d| d.date_naive().to_string()).as_deref(),
        Some("2026-10-17")
    );
    assert_eq!(verdicts[1].as_ref().map(|v| v.verdict), Some(Verdict::NotNews));
    assert!(verdicts[2].is_none(), "structured documents skip triage");

    let bodies = request_bodies(&llm_server).await;
    let user_items: Value =
        serde_json::from_str(bodies[0]["messages"][0]["content"][0]["text"].as_str().expect("text"))
            .expect("user message is JSON");
    assert_eq!(user_items.as_array().map(Vec::len), Some(2));
    assert_eq!(user_items[1]["source_type"], "site");
    assert_eq!(
        bodies[1]["messages"][2]["content"][0]["content"],
        "Upcoming webinar registration form."
    );
}

#[tokio::test]
async fn triage_retries_a_rate_limited_batch_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_llm(
        &server,
        vec![text("[{\"index\": 0, \"verdict\": \"maybe\", \"reasoning\": \"thin snippet\"}]")],
    )
    .await;

    let triager = Triager::new(
        Arc::new(LlmClient::new(http(), Some("llm-key".into()), &server.uri()).expect("client")),
        crawl(&server.uri(), None),
        settings(0),
    );
    let items = vec![DiscoveredItem::new("https://wire.example/a")];
    let verdicts = triager.classify(&items, &[Some(SourceType::Feed)], &publication()).await;

    let verdict = verdicts[0].as_ref().expect("classified");
    assert_eq!(verdict.verdict, Verdict::Ambiguous);
    assert_eq!(verdict.reasoning, "thin snippet");
}

#[tokio::test]
async fn triage_falls_back_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let triager = Triager::new(
        Arc::new(LlmClient::new(http(), Some("llm-key".into()), &server.uri()).expect("client")),
        crawl(&server.uri(), None),
        settings(0),
    );
    let items = vec![DiscoveredItem::new("https://wire.example/a"), DiscoveredItem::new("https://wire.example/b")];
    let verdicts = triager
        .classify(&items, &[Some(SourceType::Feed), Some(SourceType::KeywordSearch)], &publication())
        .await;

    for verdict in verdicts {
        let verdict = verdict.expect("classified");
        assert_eq!(verdict.verdict, Verdict::Ambiguous);
        assert_eq!(verdict.reasoning, "triage fallback");
    }
}

#[tokio::test]
async fn triage_without_key_marks_items_ambiguous() {
    let triager = Triager::new(
        Arc::new(LlmClient::new(http(), None, "http://127.0.0.1:9").expect("client")),
        crawl("http://127.0.0.1:9", None),
        settings(0),
    );
    let items = vec![DiscoveredItem::new("https://wire.example/a")];
    let verdicts = triager.classify(&items, &[Some(SourceType::Feed)], &publication()).await;
    let verdict = verdicts[0].as_ref().expect("classified");
    assert_eq!(verdict.verdict, Verdict::Ambiguous);
    assert_eq!(verdict.reasoning, "triage skipped (no API key)");
}
