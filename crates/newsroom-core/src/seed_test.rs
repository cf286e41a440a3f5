use super::*;

const VALID: &str = r"
publications:
  - name: Grain Ledger
    slug: grain-ledger
    industry_description: Commodity grain markets, wheat and corn exports
    reader_personas: Elevator operators and traders
    publication_domain: grainledger.com
    review_mode: true
    sources:
      - name: Ag Wire
        source_type: feed
        url: https://agwire.example.com/rss
      - name: Export report
        source_type: structured_document
        url: https://usda.example.gov/reports
        config:
          discovery_mode: url_pattern
          url_pattern: https://usda.example.gov/wasde{MMYY}.pdf
      - name: Rival
        source_type: competitor_site
        url: https://rival.example.com
        is_active: false
";

#[test]
fn parses_valid_seed() {
    let seed = parse_seed_file(VALID).unwrap();
    assert_eq!(seed.publications.len(), 1);
    let publication = &seed.publications[0];
    assert_eq!(publication.slug, "grain-ledger");
    assert!(publication.review_mode);
    assert!(publication.is_active);
    assert_eq!(publication.sources.len(), 3);
    assert_eq!(publication.sources[1].source_type, SourceType::StructuredDocument);
    assert!(publication.sources[0].is_active);
    assert!(!publication.sources[2].is_active);
    assert!(publication.sources[0].keywords.is_none());
}

#[test]
fn rejects_duplicate_slug() {
    let yaml = r"
publications:
  - name: A
    slug: same
  - name: B
    slug: same
";
    let err = parse_seed_file(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate publication slug")));
}

#[test]
fn rejects_uppercase_slug() {
    let yaml = r"
publications:
  - name: A
    slug: Not-Valid
";
    assert!(matches!(
        parse_seed_file(yaml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn rejects_duplicate_source_names_case_insensitively() {
    let yaml = r"
publications:
  - name: A
    slug: a
    sources:
      - name: Wire
        source_type: feed
        url: https://a.example.com/rss
      - name: wire
        source_type: site
        url: https://b.example.com
";
    let err = parse_seed_file(yaml).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("duplicate source name")));
}

#[test]
fn rejects_non_http_source_url() {
    let yaml = r"
publications:
  - name: A
    slug: a
    sources:
      - name: Wire
        source_type: feed
        url: ftp://a.example.com/rss
";
    assert!(matches!(
        parse_seed_file(yaml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn rejects_unknown_source_type() {
    let yaml = r"
publications:
  - name: A
    slug: a
    sources:
      - name: Wire
        source_type: podcast
        url: https://a.example.com
";
    assert!(matches!(
        parse_seed_file(yaml),
        Err(ConfigError::SeedFileParse(_))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let err = load_seed_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::SeedFileIo { .. }));
}
