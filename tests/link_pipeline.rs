use std::sync::Arc;
use std::time::Duration;

use linkref::config::{AppConfig, BARE_URL_PATTERN, TemplateConfig, TitleRules};
use linkref::log_sink::{LogLevel, MemoryLog};
use linkref::title_fetcher::MockTitleFetcher;
use linkref::transformer::number_links;
use linkref::types::set_all_selected;
use linkref::{LinkExtractor, TextTransformer, TitleResolver};
use tempfile::TempDir;

struct Pipeline {
    log: Arc<MemoryLog>,
    config: AppConfig,
    extractor: LinkExtractor,
    transformer: TextTransformer,
}

impl Pipeline {
    fn new(config: AppConfig) -> Self {
        let log = Arc::new(MemoryLog::new());
        let extractor = LinkExtractor::new(log.clone());
        let transformer =
            TextTransformer::new(config.templates.clone(), &config.title_rules, log.clone());
        Self {
            log,
            config,
            extractor,
            transformer,
        }
    }

    fn with_defaults() -> Self {
        Self::new(AppConfig::ephemeral())
    }
}

#[test]
fn test_markdown_and_bare_duplicate_collapse() {
    let pipeline = Pipeline::with_defaults();
    let text = "See [Example](https://example.com) and also https://example.com for more.";

    let links = pipeline.extractor.extract(text, &pipeline.config.extraction);

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, "https://example.com");
    assert_eq!(links[0].original_span, "[Example](https://example.com)");
    assert_eq!(links[0].position, 4);
}

#[test]
fn test_forward_scenario_with_default_template() {
    let pipeline = Pipeline::with_defaults();
    let text = "Visit https://a.test and https://b.test";

    let mut links = pipeline.extractor.extract(text, &pipeline.config.extraction);
    assert_eq!(links.len(), 2);

    let result = pipeline.transformer.process(text, &mut links).unwrap();
    assert_eq!(result.processed_text, "Visit [1] and [2]");
}

#[test]
fn test_broken_pattern_does_not_block_valid_one() {
    let pipeline = Pipeline::with_defaults();
    let links = pipeline
        .extractor
        .extract_with_patterns("ping https://a.test", &["[", BARE_URL_PATTERN]);

    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, "https://a.test");
    assert_eq!(pipeline.log.messages_at(LogLevel::Warning).len(), 1);
}

#[test]
fn test_numbering_dense_for_distinct_urls() {
    let pipeline = Pipeline::with_defaults();
    let text = "[one](https://1.test) https://2.test [three](http://3.test/a) https://4.test/b?c=d";

    let links = pipeline.extractor.extract(text, &pipeline.config.extraction);
    let numbers: Vec<usize> = number_links(&links).iter().map(|l| l.number).collect();

    assert_eq!(numbers, vec![1, 2, 3, 4]);
}

#[test]
fn test_forward_then_reverse_restores_urls() {
    let pipeline = Pipeline::with_defaults();
    let text = "Intro [Docs](https://docs.test/guide) and https://blog.test/post.\n\
                Again: [Docs](https://docs.test/guide).";

    let mut links = pipeline.extractor.extract(text, &pipeline.config.extraction);
    let forward = pipeline.transformer.process(text, &mut links).unwrap();

    assert_eq!(
        forward.processed_text,
        "Intro [1] and [2].\nAgain: [1]."
    );

    let reverse = pipeline
        .transformer
        .process_reverse(&forward.processed_text, &links)
        .unwrap();

    assert_eq!(
        reverse.processed_text,
        "Intro https://docs.test/guide and https://blog.test/post.\nAgain: https://docs.test/guide."
    );
}

#[test]
fn test_reverse_from_document_with_reference_list() {
    // A processed document carrying its own reference list: extracting links
    // from it yields the same numbering used for the placeholders.
    let pipeline = Pipeline::with_defaults();
    let document = "See [1] and [2].\n\n1. A — https://a.test\n2. B — https://b.test\n";

    let links = pipeline.extractor.extract(document, &pipeline.config.extraction);
    let result = pipeline.transformer.process_reverse(document, &links).unwrap();

    assert!(result.processed_text.starts_with("See https://a.test and https://b.test."));
}

#[tokio::test]
async fn test_resolved_titles_flow_into_reference_list() {
    let pipeline = Pipeline::with_defaults();
    let text = "Read https://a.test and [B](https://b.test) and https://c.test";

    let mut links = pipeline.extractor.extract(text, &pipeline.config.extraction);

    let fetcher = Arc::new(
        MockTitleFetcher::new()
            .with_title("https://a.test", "  Alpha   «Home»  ")
            .with_title("https://b.test", "Beta – Docs"),
    );
    let summary = TitleResolver::new(fetcher.clone(), pipeline.log.clone())
        .with_timeout(Duration::from_secs(1))
        .resolve(&mut links)
        .await;

    assert_eq!(summary.requested, 3);
    assert_eq!(summary.resolved, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        fetcher.get_requested_urls(),
        vec!["https://a.test", "https://b.test", "https://c.test"]
    );

    let result = pipeline.transformer.process(text, &mut links).unwrap();

    assert_eq!(result.processed_text, "Read [1] and [2] and [3]");
    assert_eq!(
        result.reference_list.as_deref(),
        Some(
            "1. Alpha \"Home\" — https://a.test\n\
             2. Beta - Docs — https://b.test\n\
             3.  — https://c.test\n"
        )
    );
}

#[test]
fn test_deselected_links_keep_their_text() {
    let pipeline = Pipeline::with_defaults();
    let text = "https://a.test https://b.test";

    let mut links = pipeline.extractor.extract(text, &pipeline.config.extraction);
    set_all_selected(&mut links, false);
    links[1].selected = true;

    let result = pipeline.transformer.process(text, &mut links).unwrap();
    assert_eq!(result.processed_text, "https://a.test [1]");
}

#[test]
fn test_config_from_disk_drives_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("linkref.json");

    let mut config = AppConfig::with_file(&path);
    config.templates = TemplateConfig {
        link_template: "^{number}".to_string(),
        reference_template: "{number}: {url}".to_string(),
    };
    config.title_rules = TitleRules::parse("Site -> Page").unwrap();
    config.save().unwrap();

    let log = MemoryLog::new();
    let loaded = AppConfig::load_or_default(&path, &log);
    assert!(log.is_empty());

    let pipeline = Pipeline::new(loaded);
    let text = "Go https://a.test now";
    let mut links = pipeline.extractor.extract(text, &pipeline.config.extraction);
    links[0].title = Some("Site".to_string());

    let result = pipeline.transformer.process(text, &mut links).unwrap();
    assert_eq!(result.processed_text, "Go ^1 now");
    assert_eq!(result.reference_list.as_deref(), Some("1: https://a.test\n"));
    assert_eq!(links[0].title.as_deref(), Some("Page"));
}
