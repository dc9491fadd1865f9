// src/memory/ranking.rs

//! Budget-constrained ranking and selection.
//!
//! Pure and read-only: identical candidates plus an identical query always
//! produce an identical result, and cancelling a retrieval mid-rank leaves
//! no side effects. Selection is a rank-ordered single forward pass with
//! skip ("best-fit-following"), not a 0/1-knapsack optimum: a too-expensive
//! record is skipped without stopping the scan, so cheaper lower-ranked
//! records can still use the remaining budget. O(n log n) sort + O(n) pass.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use crate::memory::types::{Record, RetrievalQuery, RetrievalResult, Strategy};

/// Scoring weights for the relevance strategy. Tag overlap dominates,
/// entity overlap comes second, recency only breaks near-ties
/// (tag_weight >= entity_weight >= recency_weight).
#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub tag_weight: f32,
    pub entity_weight: f32,
    pub recency_weight: f32,
    pub recency_half_life_hours: f32,
    /// Budget applied when the query carries no max_tokens.
    pub default_max_tokens: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            tag_weight: 8.0,
            entity_weight: 2.0,
            recency_weight: 1.0,
            recency_half_life_hours: 168.0, // one week
            default_max_tokens: 2048,
        }
    }
}

/// Candidate with its computed relevance score.
#[derive(Debug, Clone)]
struct ScoredRecord {
    record: Record,
    score: f32,
}

/// Exponential half-life decay of age, clamped to [0, 1]. Monotonically
/// non-increasing in age; records from the future decay as age zero.
fn recency_decay(created_at: DateTime<Utc>, now: DateTime<Utc>, half_life_hours: f32) -> f32 {
    let age_hours = (now - created_at).num_minutes() as f32 / 60.0;
    let age_hours = age_hours.max(0.0);
    let decay = (-0.693 * age_hours / half_life_hours.max(f32::EPSILON)).exp();
    decay.clamp(0.0, 1.0)
}

fn overlap_count(a: &[String], b: &[String]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let set: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.iter().filter(|t| set.contains(t.as_str())).count()
}

/// Relevance score: weighted tag overlap + entity overlap + recency decay.
fn relevance_score(
    record: &Record,
    query: &RetrievalQuery,
    now: DateTime<Utc>,
    config: &RankingConfig,
) -> f32 {
    let tag_overlap = overlap_count(&record.tags, &query.tags) as f32;
    let entity_overlap = overlap_count(&record.key_entities, &query.tags) as f32;
    let recency = recency_decay(record.created_at, now, config.recency_half_life_hours);

    tag_overlap * config.tag_weight
        + entity_overlap * config.entity_weight
        + recency * config.recency_weight
}

/// Cost used for ordering and admission. Missing estimates are
/// conservatively infinite, so such records sort last and never fit.
fn selection_cost(record: &Record) -> u64 {
    record.token_estimate.map(u64::from).unwrap_or(u64::MAX)
}

/// Total order over scored candidates. Relevance: score desc, then
/// token_estimate asc (cheaper preferred among equals), then created_at
/// desc, then id asc. Recency leads with the timestamp, lowest-cost with
/// the estimate; both fall through the same remaining tiebreaks. The final
/// id comparison makes ordering reproducible in tests.
fn compare(strategy: Strategy, a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    let leading = match strategy {
        Strategy::Relevance => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
        Strategy::Recency => b.record.created_at.cmp(&a.record.created_at),
        Strategy::LowestCost => selection_cost(&a.record).cmp(&selection_cost(&b.record)),
    };
    leading
        .then_with(|| selection_cost(&a.record).cmp(&selection_cost(&b.record)))
        .then_with(|| b.record.created_at.cmp(&a.record.created_at))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Rank candidates under the query's strategy and greedily select within
/// the token budget and record limit.
///
/// Candidates are deduplicated by id (the tag and text sources overlap).
/// An unsatisfiable budget yields an empty selection with
/// `alternative_available = true`, never an error.
pub fn rank_and_select(
    candidates: Vec<Record>,
    query: &RetrievalQuery,
    now: DateTime<Utc>,
    config: &RankingConfig,
) -> RetrievalResult {
    if candidates.is_empty() {
        return RetrievalResult::empty();
    }

    // Dedup by id, keeping first occurrence.
    let mut seen = HashSet::new();
    let mut scored: Vec<ScoredRecord> = candidates
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .map(|record| {
            // Only the relevance strategy needs a computed score; the other
            // strategies order directly on record fields in the comparator.
            let score = match query.strategy {
                Strategy::Relevance => relevance_score(&record, query, now, config),
                Strategy::Recency | Strategy::LowestCost => 0.0,
            };
            ScoredRecord { record, score }
        })
        .collect();

    scored.sort_by(|a, b| compare(query.strategy, a, b));

    let budget = query.max_tokens.unwrap_or(config.default_max_tokens);
    let limit = query.limit.unwrap_or(usize::MAX);

    let mut selected: Vec<Record> = Vec::new();
    let mut total: u64 = 0;
    let mut excluded_by_constraint = false;

    for ScoredRecord { record, .. } in scored {
        if selected.len() >= limit {
            excluded_by_constraint = true;
            break;
        }
        let cost = selection_cost(&record);
        // checked_add guards the infinite-cost sentinel for missing estimates
        if total.checked_add(cost).is_some_and(|t| t <= u64::from(budget)) {
            total += cost;
            selected.push(record);
        } else {
            // Skip and keep scanning; a cheaper record further down may fit.
            excluded_by_constraint = true;
        }
    }

    debug!(
        selected = selected.len(),
        total_tokens = total,
        budget,
        alternative_available = excluded_by_constraint,
        "selection complete"
    );

    RetrievalResult {
        records: selected,
        total_tokens_retrieved: total as u32,
        alternative_available: excluded_by_constraint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, tags: &[&str], estimate: Option<u32>, age_hours: i64) -> Record {
        Record {
            id: id.to_string(),
            record_type: "workflow_summary".to_string(),
            created_at: Utc::now() - Duration::hours(age_hours),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            summary: format!("summary for {id}"),
            token_estimate: estimate,
            source_token_cost: None,
            related_ids: vec![],
            key_entities: vec![],
        }
    }

    fn query(tags: &[&str], max_tokens: u32) -> RetrievalQuery {
        RetrievalQuery {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            free_text: None,
            max_tokens: Some(max_tokens),
            limit: None,
            strategy: Strategy::Relevance,
        }
    }

    #[test]
    fn empty_candidates_give_empty_result() {
        let result = rank_and_select(vec![], &query(&["x"], 100), Utc::now(), &RankingConfig::default());
        assert!(result.records.is_empty());
        assert_eq!(result.total_tokens_retrieved, 0);
        assert!(!result.alternative_available);
    }

    #[test]
    fn budget_is_never_exceeded() {
        let candidates = vec![
            record("a", &["t"], Some(52), 1),
            record("b", &["t"], Some(28), 2),
            record("c", &["t"], Some(35), 3),
        ];
        let result = rank_and_select(candidates, &query(&["t"], 80), Utc::now(), &RankingConfig::default());
        assert!(result.total_tokens_retrieved <= 80);
        assert!(result.alternative_available);
    }

    #[test]
    fn all_fit_when_budget_matches_total() {
        let candidates = vec![
            record("a", &["t"], Some(52), 1),
            record("b", &["t"], Some(28), 2),
            record("c", &["t"], Some(35), 3),
        ];
        let result = rank_and_select(candidates, &query(&["t"], 115), Utc::now(), &RankingConfig::default());
        assert_eq!(result.records.len(), 3);
        assert_eq!(result.total_tokens_retrieved, 115);
        assert!(!result.alternative_available);
    }

    #[test]
    fn skip_does_not_stop_the_scan() {
        // Top-ranked record is too expensive; cheaper lower-ranked ones
        // must still be admitted.
        let candidates = vec![
            record("expensive", &["t", "u"], Some(90), 1), // highest overlap
            record("cheap1", &["t"], Some(30), 2),
            record("cheap2", &["t"], Some(30), 3),
        ];
        let q = query(&["t", "u"], 70);
        let result = rank_and_select(candidates, &q, Utc::now(), &RankingConfig::default());
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["cheap1", "cheap2"]);
        assert!(result.alternative_available);
    }

    #[test]
    fn budget_below_smallest_candidate_yields_empty_with_alternative() {
        let candidates = vec![record("a", &["t"], Some(50), 1)];
        let result = rank_and_select(candidates, &query(&["t"], 10), Utc::now(), &RankingConfig::default());
        assert!(result.records.is_empty());
        assert!(result.alternative_available);
    }

    #[test]
    fn missing_estimate_is_never_admitted() {
        let candidates = vec![
            record("priced", &["t"], Some(10), 1),
            record("unpriced", &["t"], None, 1),
        ];
        let result = rank_and_select(candidates, &query(&["t"], 1000), Utc::now(), &RankingConfig::default());
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["priced"]);
        assert!(result.alternative_available);
    }

    #[test]
    fn limit_binds_independently_of_budget() {
        let candidates = vec![
            record("a", &["t"], Some(10), 1),
            record("b", &["t"], Some(10), 2),
            record("c", &["t"], Some(10), 3),
        ];
        let mut q = query(&["t"], 1000);
        q.limit = Some(2);
        let result = rank_and_select(candidates, &q, Utc::now(), &RankingConfig::default());
        assert_eq!(result.records.len(), 2);
        assert!(result.alternative_available);
    }

    #[test]
    fn ordering_is_deterministic() {
        let make = || {
            vec![
                record("b", &["t"], Some(20), 5),
                record("a", &["t"], Some(20), 5),
                record("c", &["t"], Some(20), 5),
            ]
        };
        let now = Utc::now();
        let q = query(&["t"], 1000);
        let cfg = RankingConfig::default();
        let first = rank_and_select(make(), &q, now, &cfg);
        let second = rank_and_select(make(), &q, now, &cfg);
        let ids = |r: &RetrievalResult| r.records.iter().map(|x| x.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn ties_prefer_cheaper_then_newer_then_smaller_id() {
        let mut older_cheap = record("z", &["t"], Some(10), 10);
        let newer_cheap = record("a", &["t"], Some(10), 1);
        let expensive = record("b", &["t"], Some(40), 1);
        // Same created_at for the two cheap records to reach the id tiebreak.
        older_cheap.created_at = newer_cheap.created_at;
        let candidates = vec![expensive.clone(), older_cheap.clone(), newer_cheap.clone()];
        let result = rank_and_select(candidates, &query(&["t"], 1000), Utc::now(), &RankingConfig::default());
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "z", "b"]);
    }

    #[test]
    fn increasing_budget_never_drops_a_selected_record() {
        let candidates = vec![
            record("a", &["t"], Some(52), 1),
            record("b", &["t"], Some(28), 2),
            record("c", &["t"], Some(35), 3),
            record("d", &["t"], Some(90), 4),
        ];
        let now = Utc::now();
        let cfg = RankingConfig::default();
        let mut previous: Vec<String> = Vec::new();
        for budget in [30u32, 80, 115, 300] {
            let result = rank_and_select(candidates.clone(), &query(&["t"], budget), now, &cfg);
            let ids: Vec<String> = result.records.iter().map(|r| r.id.clone()).collect();
            for prev in &previous {
                assert!(ids.contains(prev), "budget {budget} dropped previously selected {prev}");
            }
            previous = ids;
        }
    }

    #[test]
    fn recency_strategy_orders_newest_first() {
        let candidates = vec![
            record("old", &["t"], Some(10), 100),
            record("new", &["t"], Some(10), 1),
            record("mid", &["t"], Some(10), 50),
        ];
        let mut q = query(&["t"], 1000);
        q.strategy = Strategy::Recency;
        let result = rank_and_select(candidates, &q, Utc::now(), &RankingConfig::default());
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn lowest_cost_strategy_maximizes_count() {
        let candidates = vec![
            record("big", &["t"], Some(60), 1),
            record("small1", &["t"], Some(10), 2),
            record("small2", &["t"], Some(15), 3),
            record("small3", &["t"], Some(20), 4),
        ];
        let mut q = query(&["t"], 50);
        q.strategy = Strategy::LowestCost;
        let result = rank_and_select(candidates, &q, Utc::now(), &RankingConfig::default());
        let ids: Vec<&str> = result.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["small1", "small2", "small3"]);
        assert!(result.alternative_available);
    }

    #[test]
    fn entity_overlap_breaks_tag_ties() {
        let mut with_entity = record("with", &["t"], Some(10), 1);
        with_entity.key_entities = vec!["t".to_string()];
        let without = record("without", &["t"], Some(10), 1);
        let candidates = vec![without, with_entity];
        let result = rank_and_select(candidates, &query(&["t"], 1000), Utc::now(), &RankingConfig::default());
        assert_eq!(result.records[0].id, "with");
    }

    #[test]
    fn recency_decay_is_bounded_and_monotone() {
        let now = Utc::now();
        let fresh = recency_decay(now, now, 168.0);
        let week = recency_decay(now - Duration::hours(168), now, 168.0);
        let month = recency_decay(now - Duration::hours(720), now, 168.0);
        assert!(fresh <= 1.0 && fresh > 0.99);
        assert!((week - 0.5).abs() < 0.01);
        assert!(month < week);
        assert!(month >= 0.0);
    }

    #[test]
    fn duplicate_candidates_are_deduplicated() {
        let r = record("dup", &["t"], Some(10), 1);
        let result = rank_and_select(vec![r.clone(), r], &query(&["t"], 1000), Utc::now(), &RankingConfig::default());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.total_tokens_retrieved, 10);
    }
}
