//! Source scrapers against wiremock servers: feeds, news sites, and
//! structured-document reports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use newsroom_core::SourceType;
use newsroom_research::sources::structured_document::discovery::pattern_candidates;
use newsroom_research::sources::structured_document::PREVIOUS_REPORT_KEY;
use newsroom_research::types::keys;
use newsroom_research::{
    CrawlClient, CrawlRateLimiter, DocumentScraper, LlmClient, ResearchError, ScrapeStrategy, ScraperSet,
    SearchClient, SourceConfigStore, SourceRecord,
};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Grain Wire</title>
    <item>
      <title>Wheat exports climb 12%</title>
      <link>https://wire.example/markets/wheat-exports-climb</link>
      <description>Shipments rose on strong demand.</description>
      <pubDate>Sat, 17 Oct 2026 09:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

#[derive(Default)]
struct RecordingConfigStore {
    writes: Mutex<Vec<(i64, String, Value)>>,
}

#[async_trait]
impl SourceConfigStore for RecordingConfigStore {
    async fn update_config_key(&self, source_id: i64, key: &str, value: &Value) -> Result<(), ResearchError> {
        self.writes
            .lock()
            .expect("lock")
            .push((source_id, key.to_string(), value.clone()));
        Ok(())
    }
}

fn http() -> reqwest::Client {
    newsroom_research::build_http_client(5, "newsroom-test").expect("client")
}

struct Harness {
    scrapers: ScraperSet,
    config_store: Arc<RecordingConfigStore>,
}

fn harness(base_url: &str, crawl_key: Option<&str>) -> Harness {
    let crawl = Arc::new(
        CrawlClient::new(
            http(),
            crawl_key.map(str::to_string),
            base_url,
            Arc::new(CrawlRateLimiter::new(Duration::ZERO)),
        )
        .expect("client"),
    );
    let search = Arc::new(SearchClient::new(http(), Some("search-key".into()), base_url).expect("client"));
    let llm = Arc::new(LlmClient::new(http(), Some("llm-key".into()), base_url).expect("client"));
    let config_store = Arc::new(RecordingConfigStore::default());
    let documents = DocumentScraper::new(
        http(),
        Arc::clone(&crawl),
        llm,
        config_store.clone(),
        "analysis-model".into(),
    );
    Harness {
        scrapers: ScraperSet::new(http(), crawl, search, documents),
        config_store,
    }
}

fn source(source_type: SourceType, url: &str, config: Value) -> SourceRecord {
    SourceRecord {
        id: 11,
        name: "test source".into(),
        source_type: Some(source_type),
        url: url.to_string(),
        keywords: Some("wheat exports".into()),
        config,
    }
}

#[tokio::test]
async fn feed_source_yields_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), None);
    let items = h
        .scrapers
        .scrape(
            ScrapeStrategy::Feed,
            &source(SourceType::Feed, &format!("{}/rss", server.uri()), json!({})),
        )
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url, "https://wire.example/markets/wheat-exports-climb");
    assert!(items[0].published_date.is_some());
}

#[tokio::test]
async fn unreachable_feed_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), None);
    let items = h
        .scrapers
        .scrape(
            ScrapeStrategy::Feed,
            &source(SourceType::Feed, &format!("{}/rss", server.uri()), json!({})),
        )
        .await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn competitor_site_uses_posts_api_and_flags_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-json/wp/v2/posts"))
        .and(query_param("per_page", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "link": "https://rival.example/2026/10/elevator-fire",
                "title": { "rendered": "Elevator fire &amp; recovery" },
                "excerpt": { "rendered": "<p>Crews worked overnight.</p>" },
                "date_gmt": "2026-10-16T12:00:00"
            }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), None);
    let items = h
        .scrapers
        .scrape(
            ScrapeStrategy::Site { competitor: true },
            &source(SourceType::CompetitorSite, &format!("{}/news", server.uri()), json!({})),
        )
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title.as_deref(), Some("Elevator fire & recovery"));
    assert_eq!(items[0].snippet.as_deref(), Some("Crews worked overnight."));
    assert_eq!(items[0].metadata[keys::IS_COMPETITOR], true);
}

#[tokio::test]
async fn site_without_feed_falls_back_to_site_map() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/map"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "links": [
                { "url": "https://wire.example/markets/a", "title": "A" },
                { "url": "https://wire.example/markets/b", "title": "B" },
                { "url": "https://wire.example/markets/c", "title": "C" },
                { "url": "https://wire.example/markets/d", "title": "D" },
                { "url": "https://wire.example/markets/e", "title": "E" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "links": [] } })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some("crawl-key"));
    let items = h
        .scrapers
        .scrape(
            ScrapeStrategy::Site { competitor: false },
            &source(SourceType::Site, &server.uri(), json!({})),
        )
        .await;

    assert_eq!(items.len(), 5, "five mapped links need no link-scrape fallback");
    assert_eq!(items[0].title.as_deref(), Some("A"));
    assert!(items[0].metadata.get(keys::IS_COMPETITOR).is_none());
}

#[tokio::test]
async fn url_pattern_probes_lookback_months_and_analyses_only_pdfs() {
    let server = MockServer::start().await;
    let pattern = format!("{}/reports/grain-{{MMYY}}", server.uri());
    let candidates = pattern_candidates(&pattern, 2, Utc::now());
    assert_eq!(candidates.len(), 2);
    let (pdf_url, pdf_month) = &candidates[0];
    let (html_url, _) = &candidates[1];
    let pdf_path = pdf_url.trim_start_matches(&server.uri()).to_string();
    let html_path = html_url.trim_start_matches(&server.uri()).to_string();

    Mock::given(method("HEAD"))
        .and(path(pdf_path.as_str()))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path(html_path.as_str()))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(pdf_path.as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string(
                    "Grain Stocks Report\nCommodity    Stocks    Change\nWheat    1,980    +4%\n\
                     Corn    4,100    -1%\nSoybeans    950    +2%\nStocks held in all positions rose.",
                ),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(html_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{
                "type": "text",
                "text": "{\"report_summary\": \"Wheat stocks up 4%.\", \"key_figures\": {\"wheat\": \"1,980\"}, \
                         \"story_angles\": [{\"headline\": \"Wheat stocks rise 4%\", \"summary\": \"Wheat stocks rose.\", \
                         \"commodity\": \"wheat\", \"significance\": \"high\", \"angle_type\": \"supply_shift\"}]}"
            }],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server.uri(), None);
    let config = json!({
        "discovery_mode": "url_pattern",
        "document_type": "pdf",
        "report_name": "Grain Stocks",
        "publisher": "Dept. of Agriculture",
        "cadence": "monthly",
        "analysis_prompt": "Identify news angles for grain traders.",
        "url_pattern": pattern,
        "lookback_months": 2
    });
    let items = h
        .scrapers
        .scrape(
            ScrapeStrategy::StructuredDocument,
            &source(SourceType::StructuredDocument, &server.uri(), config),
        )
        .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url, format!("{pdf_url}?angle=1"));
    assert_eq!(items[0].title.as_deref(), Some("Wheat stocks rise 4%"));
    assert_eq!(items[0].meta_str("report_date"), Some(pdf_month.as_str()));
    assert_eq!(items[0].meta_str(keys::CONTENT_SOURCE), Some("document_analysis"));

    let writes = h.config_store.writes.lock().expect("lock").clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, 11);
    assert_eq!(writes[0].1, PREVIOUS_REPORT_KEY);
    assert_eq!(writes[0].2["report_summary"], "Wheat stocks up 4%.");
    assert_eq!(writes[0].2["report_date"], pdf_month.as_str());
}

#[tokio::test]
async fn invalid_document_config_yields_nothing() {
    let server = MockServer::start().await;
    let h = harness(&server.uri(), None);
    let items = h
        .scrapers
        .scrape(
            ScrapeStrategy::StructuredDocument,
            &source(SourceType::StructuredDocument, &server.uri(), json!({ "discovery_mode": "url_pattern" })),
        )
        .await;
    assert!(items.is_empty());
    assert!(h.config_store.writes.lock().expect("lock").is_empty());
}
