// tests/retrieval_test.rs


use mnemo::memory::types::{RecordInput, RetrievalQuery, Strategy};

fn input(summary: &str, tags: &[&str], estimate: i64) -> RecordInput {
    RecordInput {
        record_type: "workflow_summary".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        summary: summary.to_string(),
        token_estimate: Some(estimate),
        source_token_cost: None,
        related_ids: vec![],
        key_entities: vec![],
    }
}

async fn seed_retention_corpus(service: &mnemo::memory::MemoryService) {
    let tags = ["customer_retention", "q4_2024"];
    for (summary, cost) in [
        ("Churn driver analysis for Q4", 52),
        ("Retention cohort breakdown", 28),
        ("Win-back campaign outcomes", 35),
    ] {
        service.store_record(input(summary, &tags, cost)).await.unwrap();
    }
}

#[tokio::test]
async fn full_corpus_fits_at_exact_budget() {
    let service = test_helpers::create_fixed_service("unused").await;
    seed_retention_corpus(&service).await;

    let mut query = RetrievalQuery::by_tags(["customer_retention", "q4_2024"]);
    query.max_tokens = Some(115);

    let result = service.retrieve(&query).await.unwrap();
    assert_eq!(result.records.len(), 3);
    assert_eq!(result.total_tokens_retrieved, 115);
    assert!(!result.alternative_available);
}

#[tokio::test]
async fn tight_budget_drops_a_candidate_and_flags_it() {
    let service = test_helpers::create_fixed_service("unused").await;
    seed_retention_corpus(&service).await;

    let mut query = RetrievalQuery::by_tags(["customer_retention", "q4_2024"]);
    query.max_tokens = Some(80);

    let result = service.retrieve(&query).await.unwrap();
    assert!(result.total_tokens_retrieved <= 80);
    assert_eq!(result.records.len(), 2);
    assert!(result.alternative_available);
}

#[tokio::test]
async fn matching_record_is_always_a_candidate_when_budget_allows() {
    let service = test_helpers::create_fixed_service("unused").await;
    let id = service
        .store_record(input("solo summary", &["unique_tag"], 40))
        .await
        .unwrap();

    let mut query = RetrievalQuery::by_tags(["unique_tag"]);
    query.max_tokens = Some(40);

    let result = service.retrieve(&query).await.unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].id, id);
}

#[tokio::test]
async fn empty_tag_query_returns_empty_result_not_corpus() {
    let service = test_helpers::create_fixed_service("unused").await;
    seed_retention_corpus(&service).await;

    let query = RetrievalQuery::by_tags(Vec::<String>::new());
    let result = service.retrieve(&query).await.unwrap();
    assert!(result.records.is_empty());
    assert!(!result.alternative_available);
}

#[tokio::test]
async fn free_text_widens_the_candidate_set() {
    let service = test_helpers::create_fixed_service("unused").await;
    service
        .store_record(input("pricing experiment recap", &["pricing"], 20))
        .await
        .unwrap();
    service
        .store_record(input("support ticket recap", &["support"], 20))
        .await
        .unwrap();

    let mut query = RetrievalQuery::by_tags(["pricing"]);
    query.free_text = Some("recap".to_string());

    let result = service.retrieve(&query).await.unwrap();
    assert_eq!(result.records.len(), 2);
}

#[tokio::test]
async fn identical_queries_return_identical_ordering() {
    let service = test_helpers::create_fixed_service("unused").await;
    seed_retention_corpus(&service).await;

    let query = RetrievalQuery::by_tags(["customer_retention", "q4_2024"]);
    let first = service.retrieve(&query).await.unwrap();
    let second = service.retrieve(&query).await.unwrap();

    let ids = |r: &mnemo::memory::types::RetrievalResult| {
        r.records.iter().map(|x| x.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn recency_strategy_returns_newest_first() {
    let service = test_helpers::create_fixed_service("unused").await;
    let first = service.store_record(input("oldest", &["t"], 10)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = service.store_record(input("newest", &["t"], 10)).await.unwrap();

    let mut query = RetrievalQuery::by_tags(["t"]);
    query.strategy = Strategy::Recency;

    let result = service.retrieve(&query).await.unwrap();
    let ids: Vec<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
}

#[tokio::test]
async fn lowest_cost_strategy_packs_more_records() {
    let service = test_helpers::create_fixed_service("unused").await;
    service.store_record(input("large", &["t"], 60)).await.unwrap();
    service.store_record(input("small one", &["t"], 10)).await.unwrap();
    service.store_record(input("small two", &["t"], 12)).await.unwrap();

    let mut query = RetrievalQuery::by_tags(["t"]);
    query.max_tokens = Some(30);
    query.strategy = Strategy::LowestCost;

    let result = service.retrieve(&query).await.unwrap();
    assert_eq!(result.records.len(), 2);
    assert!(result.alternative_available);
}

#[tokio::test]
async fn limit_caps_count_even_under_a_loose_budget() {
    let service = test_helpers::create_fixed_service("unused").await;
    seed_retention_corpus(&service).await;

    let mut query = RetrievalQuery::by_tags(["customer_retention"]);
    query.max_tokens = Some(10_000);
    query.limit = Some(1);

    let result = service.retrieve(&query).await.unwrap();
    assert_eq!(result.records.len(), 1);
    assert!(result.alternative_available);
}

#[tokio::test]
async fn record_without_estimate_is_excluded_not_fatal() {
    let service = test_helpers::create_fixed_service("unused").await;
    service.store_record(input("priced", &["t"], 10)).await.unwrap();
    service
        .store_record(RecordInput {
            record_type: "workflow_summary".to_string(),
            tags: vec!["t".to_string()],
            summary: "unpriced".to_string(),
            token_estimate: None,
            source_token_cost: None,
            related_ids: vec![],
            key_entities: vec![],
        })
        .await
        .unwrap();

    let query = RetrievalQuery::by_tags(["t"]);
    let result = service.retrieve(&query).await.unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].summary, "priced");
}

#[tokio::test]
async fn retrievals_append_accounting_entries() {
    let service = test_helpers::create_fixed_service("unused").await;
    seed_retention_corpus(&service).await;

    let since = chrono::Utc::now() - chrono::Duration::minutes(1);
    let query = RetrievalQuery::by_tags(["customer_retention"]);
    service.retrieve(&query).await.unwrap();
    service.retrieve(&query).await.unwrap();

    let rollup = service.rollup_since(since).await.unwrap();
    assert_eq!(rollup.events, 2);
    assert_eq!(rollup.records_returned, 6);
    assert!(rollup.tokens_returned > 0);
}

#[tokio::test]
async fn negative_token_estimate_is_rejected_before_storage() {
    let service = test_helpers::create_fixed_service("unused").await;
    let err = service
        .store_record(input("bad", &["t"], -7))
        .await
        .unwrap_err();
    assert!(matches!(err, mnemo::memory::MemoryError::Validation(_)));
    assert!(service.list_available().await.unwrap().is_empty());
}
