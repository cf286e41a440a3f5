use chrono::TimeZone;

use super::*;

fn publication() -> PublicationContext {
    PublicationContext {
        id: 1,
        name: "Grain Ledger".into(),
        industry_description: Some("Grain markets and commodity trading".into()),
        reader_personas: None,
        publication_domain: Some("grainledger.com".into()),
        is_active: true,
    }
}

#[test]
fn multipliers() {
    assert!((Verdict::Relevant.multiplier() - 1.15).abs() < f64::EPSILON);
    assert!((Verdict::Ambiguous.multiplier() - 1.0).abs() < f64::EPSILON);
    assert!(Verdict::NotNews.multiplier().abs() < f64::EPSILON);
}

#[test]
fn verdict_wire_names() {
    for verdict in [Verdict::Relevant, Verdict::Ambiguous, Verdict::NotNews] {
        assert_eq!(Verdict::parse(verdict.as_str()), Some(verdict));
    }
    assert_eq!(Verdict::parse("news"), None);
}

#[test]
fn fetch_budget_is_shared_and_bounded() {
    let budget = FetchBudget::new(2);
    assert!(budget.try_take());
    assert!(budget.try_take());
    assert!(!budget.try_take());
    assert_eq!(budget.remaining(), 0);
}

#[test]
fn later_batches_get_fewer_turns_as_budget_drains() {
    let budget = FetchBudget::new(3);
    assert_eq!(batch_limits(&budget).max_turns, 5);

    while budget.try_take() {}
    assert_eq!(batch_limits(&budget).max_turns, 2);
}

#[test]
fn system_prompt_mentions_context() {
    let prompt = build_system_prompt(&publication(), 90);
    assert!(prompt.contains("Grain markets and commodity trading"));
    assert!(prompt.contains("## Reader Personas\nNot specified"));
    assert!(prompt.contains("last 90 days"));
    assert!(prompt.contains("fetch_page"));
}

#[test]
fn user_message_truncates_snippets() {
    let item = DiscoveredItem::new("https://a.com/x")
        .with_title(Some("Wheat".into()))
        .with_snippet(Some("s".repeat(500)));
    let untitled = DiscoveredItem::new("https://a.com/y");
    let message = build_user_message(&[
        (&item, Some(SourceType::Feed)),
        (&untitled, None),
    ]);
    let parsed: Value = serde_json::from_str(&message).unwrap();
    assert_eq!(parsed[0]["index"], 0);
    assert_eq!(parsed[0]["snippet"].as_str().unwrap().len(), 300);
    assert_eq!(parsed[0]["source_type"], "feed");
    assert_eq!(parsed[1]["title"], "");
    assert_eq!(parsed[1]["source_type"], "unknown");
}

#[test]
fn parses_plain_array() {
    let text = r#"[
        {"index": 0, "verdict": "relevant_news", "reasoning": "wheat prices", "published_date": "2026-10-01"},
        {"index": 1, "verdict": "not_news", "reasoning": "tag page", "published_date": null}
    ]"#;
    let verdicts = parse_verdicts(text, 2);
    assert_eq!(verdicts[0].verdict, Verdict::Relevant);
    assert_eq!(
        verdicts[0].published_date,
        Some(Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(verdicts[1].verdict, Verdict::NotNews);
    assert_eq!(verdicts[1].reasoning, "tag page");
    assert_eq!(verdicts[1].published_date, None);
}

#[test]
fn parses_fenced_array() {
    let text = "Here you go:\n```json\n[{\"index\": 0, \"verdict\": \"not_news\", \"reasoning\": \"login\"}]\n```";
    let verdicts = parse_verdicts(text, 1);
    assert_eq!(verdicts[0].verdict, Verdict::NotNews);
}

#[test]
fn extracts_array_from_prose() {
    let text = "Verdicts: [{\"index\": 0, \"verdict\": \"relevant_news\", \"reasoning\": \"ok\"}] done.";
    assert_eq!(parse_verdicts(text, 1)[0].verdict, Verdict::Relevant);
}

#[test]
fn missing_index_and_bad_verdict_are_ambiguous() {
    let text = r#"[{"index": 1, "verdict": "breaking", "reasoning": ""}]"#;
    let verdicts = parse_verdicts(text, 2);
    assert_eq!(verdicts.len(), 2);
    assert_eq!(verdicts[0], TriageVerdict::ambiguous(NO_REASONING));
    assert_eq!(verdicts[1].verdict, Verdict::Ambiguous);
    assert_eq!(verdicts[1].reasoning, NO_REASONING);
}

#[test]
fn garbage_falls_back_for_every_item() {
    for text in ["", "   ", "not json at all", "{\"index\": 0}"] {
        let verdicts = parse_verdicts(text, 3);
        assert_eq!(verdicts.len(), 3);
        assert!(verdicts
            .iter()
            .all(|v| v.verdict == Verdict::Ambiguous && v.reasoning == FALLBACK_REASON));
    }
}
