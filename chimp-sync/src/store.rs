//! Storage gateway consumed by the importers.
//!
//! The pipeline only needs three primitives from its document store:
//! unordered bulk upsert keyed by `id`, filtered reads with a small filter
//! language (equality, numeric ranges, AND/OR composition), and id lookup.
//! Any driver offering those can implement [`DocumentStore`]; the crate
//! ships an in-memory implementation that doubles as the reference
//! semantics for tests.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::errors::Result;

pub type Document = Map<String, Value>;

/// Filter language for [`DocumentStore::query_by_filter`].
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    Eq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::Gt(field, value) => {
                matches!(compare(doc.get(field), value), Some(Ordering::Greater))
            }
            Filter::Gte(field, value) => matches!(
                compare(doc.get(field), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Filter::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }
}

fn compare(doc_value: Option<&Value>, filter_value: &Value) -> Option<Ordering> {
    let doc_value = doc_value?;
    match (doc_value.as_f64(), filter_value.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => match (doc_value.as_str(), filter_value.as_str()) {
            (Some(a), Some(b)) => Some(a.cmp(b)),
            _ => None,
        },
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Keep only these fields in the returned documents.
    pub projection: Option<Vec<String>>,
    /// Ascending sort by a single field.
    pub sort_by: Option<String>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

/// Per-item outcome set of one unordered bulk upsert. Item failures never
/// abort sibling items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    pub inserted: usize,
    pub replaced: usize,
    pub failed: Vec<BulkItemError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemError {
    pub index: usize,
    pub message: String,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replace-if-exists, insert-if-absent by the document's `id` field, as
    /// one unordered bulk operation.
    async fn upsert_bulk(&self, collection: &str, docs: Vec<Document>) -> Result<BulkOutcome>;

    async fn query_by_filter(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>>;
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert_bulk(&self, collection: &str, docs: Vec<Document>) -> Result<BulkOutcome> {
        let mut collections = self.collections.write().await;
        let target = collections.entry(collection.to_string()).or_default();

        let mut outcome = BulkOutcome::default();
        for (index, doc) in docs.into_iter().enumerate() {
            let Some(id) = doc.get("id").and_then(Value::as_str).map(String::from) else {
                outcome.failed.push(BulkItemError {
                    index,
                    message: "document has no string `id` field".into(),
                });
                continue;
            };
            if target.insert(id, doc).is_some() {
                outcome.replaced += 1;
            } else {
                outcome.inserted += 1;
            }
        }

        Ok(outcome)
    }

    async fn query_by_filter(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(collection)
            .map(|c| c.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();

        if let Some(field) = &options.sort_by {
            docs.sort_by(|a, b| match (a.get(field), b.get(field)) {
                (Some(x), Some(y)) => compare(Some(x), y).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            });
        } else {
            // Hash order is not stable; key order keeps reads deterministic
            docs.sort_by(|a, b| match (a.get("id"), b.get("id")) {
                (Some(x), Some(y)) => compare(Some(x), y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            });
        }

        let skip = options.skip.unwrap_or(0);
        let docs = docs.into_iter().skip(skip);
        let mut docs: Vec<Document> = match options.limit {
            Some(limit) => docs.take(limit).collect(),
            None => docs.collect(),
        };

        if let Some(fields) = &options.projection {
            for doc in &mut docs {
                doc.retain(|key, _| fields.iter().any(|f| f == key));
            }
        }

        Ok(docs)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }
}
