//! Federated sales search for Salesdesk.
//!
//! Resolves which indexes a user may query from their group memberships,
//! queries each permitted index with retry and backoff, aggregates sales-order
//! rows into a territory summary, and caches the resulting sales context per
//! rep with a TTL and LRU eviction.

pub mod access;
pub mod aggregate;
pub mod cache;
pub mod client;
pub mod error;
pub mod federated;
pub mod provider;

pub use access::IndexAccess;
pub use aggregate::SalesAggregator;
pub use cache::SalesDataCache;
pub use client::{AzureSearchClient, Document, IndexSearcher};
pub use error::SearchError;
pub use federated::{FederatedResults, FederatedSearch, RankedResult, RetryPolicy, SearchHit};
pub use provider::SalesContextProvider;
