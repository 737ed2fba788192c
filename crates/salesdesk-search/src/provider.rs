//! Builds the per-rep [`SalesContext`] from federated search results.

use std::sync::Arc;

use tracing::{debug, info};

use salesdesk_core::types::{SalesContext, UserIdentity};

use crate::cache::SalesDataCache;
use crate::federated::{FederatedResults, FederatedSearch, RankedResult, MATCH_ALL};

/// Number of lower-ranked hits carried as additional context.
const ADDITIONAL_CONTEXT_HITS: usize = 2;

/// Loads sales contexts, going through the cache.
pub struct SalesContextProvider {
    search: Arc<FederatedSearch>,
    cache: Arc<SalesDataCache>,
}

impl SalesContextProvider {
    pub fn new(search: Arc<FederatedSearch>, cache: Arc<SalesDataCache>) -> Self {
        Self { search, cache }
    }

    pub fn cache(&self) -> &SalesDataCache {
        &self.cache
    }

    /// Cached context for the rep, or a fresh load on a miss.
    pub async fn get_or_fetch(&self, identity: &UserIdentity) -> SalesContext {
        if let Some(ctx) = self.cache.get(&identity.email) {
            debug!(email = %identity.email, "Sales context cache hit");
            return ctx;
        }
        self.load_fresh(identity).await
    }

    /// Query every permitted index and rebuild the rep's context.
    ///
    /// The result is cached only when the search returned something, so a
    /// rep with no data is retried on the next request.
    pub async fn load_fresh(&self, identity: &UserIdentity) -> SalesContext {
        let results = self
            .search
            .search(MATCH_ALL, &identity.groups, &identity.email)
            .await;

        let mut ctx = SalesContext::for_email(&identity.email);
        if results.is_empty() {
            info!(email = %identity.email, "No sales data found for rep");
            return ctx;
        }

        merge_results(&mut ctx, &results);
        self.cache.set(&identity.email, ctx.clone());
        info!(
            email = %identity.email,
            orders = ctx.summary.total_orders,
            indexes = ctx.index_data.len(),
            "Loaded sales context"
        );
        ctx
    }
}

/// Fold search results into `ctx`.
///
/// The summary replaces the context's summary. Each non-sales index
/// contributes its lowest-ranked hit to `index_data` (later hits overwrite
/// earlier ones); the hits ranked second and third overall become
/// `additional_context` when they come from non-sales indexes.
pub fn merge_results(ctx: &mut SalesContext, results: &FederatedResults) {
    if let Some((_, summary)) = &results.summary {
        ctx.summary = summary.clone();
    }

    for hit in &results.hits {
        if results.is_sales_index(&hit.index_name) {
            continue;
        }
        ctx.index_data.insert(
            hit.index_name.clone(),
            serde_json::Value::Object(hit.document.clone()),
        );
    }

    ctx.additional_context = results
        .ranked()
        .into_iter()
        .skip(1)
        .take(ADDITIONAL_CONTEXT_HITS)
        .filter_map(|r| match r {
            RankedResult::Hit(hit)
                if !results.is_sales_index(&hit.index_name) && !hit.document.is_empty() =>
            {
                Some(serde_json::Value::Object(hit.document.clone()))
            }
            _ => None,
        })
        .collect();
}
