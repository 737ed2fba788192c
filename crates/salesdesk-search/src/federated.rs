//! Federated search across every index a user may read.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use salesdesk_core::config::{SalesdeskConfig, SearchConfig};
use salesdesk_core::types::SalesSummary;

use crate::access::IndexAccess;
use crate::aggregate::SalesAggregator;
use crate::client::{Document, IndexSearcher};
use crate::error::SearchError;

/// Query used when the caller passes an empty one.
pub const MATCH_ALL: &str = "*";

/// Retry schedule for one index query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Delay after the zero-based `attempt` failed: `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// One row from one index with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub index_name: String,
    pub score: f64,
    pub document: Document,
}

/// A result in final ranking order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankedResult<'a> {
    /// The aggregated sales summary, always ranked first.
    Summary {
        index_name: &'a str,
        summary: &'a SalesSummary,
    },
    Hit(&'a SearchHit),
}

/// Output of [`FederatedSearch::search`].
#[derive(Debug, Clone, Default)]
pub struct FederatedResults {
    /// Present only when at least one sales order was counted.
    pub summary: Option<(String, SalesSummary)>,
    /// Every hit from every index, highest score first.
    pub hits: Vec<SearchHit>,
    /// Indexes whose rows feed the summary.
    pub sales_indexes: Vec<String>,
}

impl FederatedResults {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.hits.is_empty()
    }

    pub fn is_sales_index(&self, index: &str) -> bool {
        self.sales_indexes.iter().any(|i| i == index)
    }

    /// Summary first (when present), then hits by descending score.
    pub fn ranked(&self) -> Vec<RankedResult<'_>> {
        let mut ranked = Vec::with_capacity(self.hits.len() + 1);
        if let Some((index_name, summary)) = &self.summary {
            ranked.push(RankedResult::Summary {
                index_name,
                summary,
            });
        }
        ranked.extend(self.hits.iter().map(RankedResult::Hit));
        ranked
    }
}

/// Queries each permitted index and merges the results.
pub struct FederatedSearch {
    searcher: Arc<dyn IndexSearcher>,
    access: IndexAccess,
    sales_indexes: Vec<String>,
    retry: RetryPolicy,
}

impl FederatedSearch {
    pub fn new(
        searcher: Arc<dyn IndexSearcher>,
        access: IndexAccess,
        sales_indexes: Vec<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            searcher,
            access,
            sales_indexes,
            retry,
        }
    }

    pub fn from_config(searcher: Arc<dyn IndexSearcher>, config: &SalesdeskConfig) -> Self {
        Self::new(
            searcher,
            IndexAccess::new(config.group_index_map()),
            config.search.general_indexes.clone(),
            RetryPolicy::from_config(&config.search),
        )
    }

    pub fn access(&self) -> &IndexAccess {
        &self.access
    }

    /// Run `query` against every index `groups` grant, filtered to `email`.
    ///
    /// Never fails: an index that cannot be queried is logged and skipped.
    pub async fn search(&self, query: &str, groups: &[String], email: &str) -> FederatedResults {
        let allowed = self.access.allowed_indexes(groups);
        if allowed.is_empty() {
            info!("User has no accessible indexes");
            return FederatedResults::default();
        }

        let query = if query.trim().is_empty() {
            MATCH_ALL
        } else {
            query
        };

        let mut aggregator = SalesAggregator::new();
        let mut hits = Vec::new();

        for index in &allowed {
            let rows = match self.query_with_retry(index, query, email).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(index = %index, error = %e, "Federated search skipped index");
                    continue;
                }
            };
            debug!(index = %index, rows = rows.len(), "Index returned rows");

            if self.sales_indexes.contains(index) {
                for row in &rows {
                    aggregator.accumulate(row);
                }
            }

            hits.extend(rows.into_iter().map(|document| SearchHit {
                index_name: index.clone(),
                score: document
                    .get("@search.score")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0),
                document,
            }));
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let summary = if aggregator.total_orders() > 0 {
            let index_name = self
                .sales_indexes
                .first()
                .cloned()
                .unwrap_or_default();
            Some((index_name, aggregator.finish()))
        } else {
            None
        };

        FederatedResults {
            summary,
            hits,
            sales_indexes: self.sales_indexes.clone(),
        }
    }

    async fn query_with_retry(
        &self,
        index: &str,
        query: &str,
        email: &str,
    ) -> Result<Vec<Document>, SearchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.searcher.search(index, query, email).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        index,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Index query failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    /// Scripted searcher: each index pops responses in order, and repeats
    /// the last one once the script runs out.
    #[derive(Default)]
    struct ScriptedSearcher {
        scripts: Mutex<HashMap<String, Vec<Result<Vec<Document>, SearchError>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedSearcher {
        fn script(self, index: &str, responses: Vec<Result<Vec<Document>, SearchError>>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(index.to_string(), responses);
            self
        }

        fn calls_for(&self, index: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.as_str() == index)
                .count()
        }
    }

    fn clone_result(r: &Result<Vec<Document>, SearchError>) -> Result<Vec<Document>, SearchError> {
        match r {
            Ok(docs) => Ok(docs.clone()),
            Err(SearchError::Transient(m)) => Err(SearchError::Transient(m.clone())),
            Err(SearchError::Rejected { status, message }) => Err(SearchError::Rejected {
                status: *status,
                message: message.clone(),
            }),
            Err(SearchError::InvalidResponse(m)) => Err(SearchError::InvalidResponse(m.clone())),
        }
    }

    #[async_trait]
    impl IndexSearcher for ScriptedSearcher {
        async fn search(
            &self,
            index: &str,
            _query: &str,
            _email: &str,
        ) -> Result<Vec<Document>, SearchError> {
            self.calls.lock().unwrap().push(index.to_string());
            let mut scripts = self.scripts.lock().unwrap();
            let script = scripts.entry(index.to_string()).or_default();
            match script.len() {
                0 => Ok(Vec::new()),
                1 => clone_result(&script[0]),
                _ => script.remove(0),
            }
        }
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn access() -> IndexAccess {
        let mut map = BTreeMap::new();
        map.insert("reps".to_string(), vec!["sales".to_string()]);
        map.insert(
            "ops".to_string(),
            vec!["telemetry".to_string(), "feedback".to_string()],
        );
        IndexAccess::new(map)
    }

    fn search_with(searcher: Arc<ScriptedSearcher>) -> FederatedSearch {
        FederatedSearch::new(
            searcher,
            access(),
            vec!["sales".to_string()],
            RetryPolicy::default(),
        )
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_no_groups_means_no_queries() {
        let searcher = Arc::new(ScriptedSearcher::default());
        let federated = search_with(searcher.clone());

        let results = federated.search("", &groups(&["visitors"]), "rep@example.com").await;
        assert!(results.is_empty());
        assert!(searcher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queries_exactly_allowed_indexes() {
        let searcher = Arc::new(ScriptedSearcher::default());
        let federated = search_with(searcher.clone());

        federated
            .search("*", &groups(&["reps", "ops", "reps"]), "rep@example.com")
            .await;

        let calls = searcher.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["sales", "telemetry", "feedback"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let searcher = Arc::new(
            ScriptedSearcher::default().script(
                "sales",
                vec![
                    Err(SearchError::Transient("503".to_string())),
                    Ok(vec![doc(json!({"Sales_Order_Number": "1", "@search.score": 1.0}))]),
                ],
            ),
        );
        let federated = search_with(searcher.clone());

        let results = federated.search("", &groups(&["reps"]), "rep@example.com").await;
        assert_eq!(searcher.calls_for("sales"), 2);
        assert_eq!(results.hits.len(), 1);
        assert!(results.summary.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_failing_every_attempt_is_excluded() {
        let searcher = Arc::new(
            ScriptedSearcher::default()
                .script("telemetry", vec![Err(SearchError::Transient("timeout".to_string()))])
                .script(
                    "feedback",
                    vec![Ok(vec![doc(json!({"note": "ok", "@search.score": 0.4}))])],
                ),
        );
        let federated = search_with(searcher.clone());

        let results = federated.search("", &groups(&["ops"]), "rep@example.com").await;
        assert_eq!(searcher.calls_for("telemetry"), 3);
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].index_name, "feedback");
    }

    #[tokio::test]
    async fn test_rejected_query_is_not_retried() {
        let searcher = Arc::new(ScriptedSearcher::default().script(
            "sales",
            vec![Err(SearchError::Rejected {
                status: 404,
                message: "no such index".to_string(),
            })],
        ));
        let federated = search_with(searcher.clone());

        let results = federated.search("", &groups(&["reps"]), "rep@example.com").await;
        assert_eq!(searcher.calls_for("sales"), 1);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_hits_ranked_with_summary_first() {
        let searcher = Arc::new(
            ScriptedSearcher::default()
                .script(
                    "sales",
                    vec![Ok(vec![doc(json!({"Sales_Order_Number": "1", "@search.score": 0.2}))])],
                )
                .script(
                    "telemetry",
                    vec![Ok(vec![
                        doc(json!({"id": "t1", "@search.score": 0.9})),
                        doc(json!({"id": "t2"})),
                    ])],
                ),
        );
        let federated = search_with(searcher);

        let results = federated
            .search("", &groups(&["reps", "ops"]), "rep@example.com")
            .await;
        let scores: Vec<f64> = results.hits.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.9, 0.2, 0.0]);

        let ranked = results.ranked();
        assert_eq!(ranked.len(), 4);
        match ranked[0] {
            RankedResult::Summary {
                index_name,
                summary,
            } => {
                assert_eq!(index_name, "sales");
                assert_eq!(summary.total_orders, 1);
            }
            RankedResult::Hit(_) => panic!("summary should rank first"),
        }
    }

    #[tokio::test]
    async fn test_non_sales_rows_are_not_aggregated() {
        let searcher = Arc::new(ScriptedSearcher::default().script(
            "telemetry",
            vec![Ok(vec![doc(json!({"Sales_Order_Number": "9"}))])],
        ));
        let federated = search_with(searcher);

        let results = federated.search("", &groups(&["ops"]), "rep@example.com").await;
        assert!(results.summary.is_none());
        assert_eq!(results.hits.len(), 1);
    }
}
