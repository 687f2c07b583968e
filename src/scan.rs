//! Collection / Scan Engine (spec.md §4.F).
//!
//! Pages through a collection, fanning documents out to the document
//! validator under a concurrency cap. Grounded on the same "bounded
//! parallel work" shape the teacher expresses with `tokio::spawn` +
//! shared state in `services/notification_scheduler.rs`, generalized here
//! to a `Semaphore`-gated `JoinSet` so the concurrency cap is explicit
//! rather than implicit in how many tasks happen to be spawned.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use serde::{Deserialize, Serialize};

use crate::document_validator::{self, DocumentResult};
use crate::prober::HttpProber;
use crate::store::DocumentStore;
use crate::validator::UrlValidator;
use crate::value::Value;
use crate::walker;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub batch_size: u32,
    pub limit: Option<u32>,
    /// Skips the per-document probe pass (§4.F `skipValidation?`) — the
    /// scan still pages through matching documents and reports their
    /// discovered fields, but every field's verdict is reported as
    /// missing/unvalidated rather than probed over HTTP.
    pub skip_validation: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            batch_size: 50,
            limit: None,
            skip_validation: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionFilter {
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

impl CollectionFilter {
    pub fn allows(&self, collection: &str) -> bool {
        if let Some(include) = &self.include {
            return include.iter().any(|c| c == collection);
        }
        if let Some(exclude) = &self.exclude {
            return !exclude.iter().any(|c| c == collection);
        }
        true
    }
}

#[tracing::instrument(skip(store, validator))]
pub async fn validate_collection<S, P>(
    store: Arc<S>,
    validator: Arc<UrlValidator<P>>,
    collection: &str,
    options: &ScanOptions,
) -> Vec<DocumentResult>
where
    S: DocumentStore + 'static,
    P: HttpProber + 'static,
{
    let mut results = Vec::new();
    let mut page_token: Option<String> = None;
    let concurrency = options.batch_size.max(1) as usize;

    loop {
        let page = match store
            .page_collection(collection, page_token.as_deref(), options.batch_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                error!(collection, error = %e, "failed to page collection");
                break;
            }
        };

        if page.documents.is_empty() {
            break;
        }

        if options.skip_validation {
            for (doc_id, document) in page.documents {
                results.push(discover_without_probing(collection, &doc_id, &document));
            }
            page_token = page.next_page_token;
            if options.limit.is_some_and(|limit| results.len() as u32 >= limit) || page_token.is_none() {
                break;
            }
            continue;
        }

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks: JoinSet<DocumentResult> = JoinSet::new();

        for (doc_id, _) in page.documents {
            let store = Arc::clone(&store);
            let validator = Arc::clone(&validator);
            let semaphore = Arc::clone(&semaphore);
            let collection = collection.to_string();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                document_validator::validate_document(&*store, &*validator, &collection, &doc_id).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(join_error) => {
                    warn!(error = %join_error, "a document validation task panicked; scan continues");
                }
            }
        }

        if let Some(limit) = options.limit {
            if results.len() as u32 >= limit {
                results.truncate(limit as usize);
                break;
            }
        }

        page_token = page.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    results
}

/// Discovers URL-bearing fields without probing them (§4.F
/// `skipValidation`). Every discovered field counts toward `total_urls`
/// and `missing_urls` — it's unvalidated, not known-missing, but the
/// result shape has no third bucket for that, and "not yet checked"
/// behaves like "not confirmed present" for downstream reporting.
fn discover_without_probing(collection: &str, document_id: &str, document: &Value) -> DocumentResult {
    let paths = walker::discover(document);
    let total = paths.len() as u32;
    DocumentResult {
        collection: collection.to_string(),
        document_id: document_id.to_string(),
        total_urls: total,
        valid_urls: 0,
        invalid_urls: 0,
        missing_urls: total,
        fields: Vec::new(),
    }
}

#[tracing::instrument(skip(store, validator))]
pub async fn validate_all<S, P>(
    store: Arc<S>,
    validator: Arc<UrlValidator<P>>,
    filter: &CollectionFilter,
    options: &ScanOptions,
) -> Vec<DocumentResult>
where
    S: DocumentStore + 'static,
    P: HttpProber + 'static,
{
    let collections = match store.list_collections().await {
        Ok(collections) => collections,
        Err(e) => {
            error!(error = %e, "failed to list collections");
            return Vec::new();
        }
    };

    let mut results = Vec::new();
    for collection in collections.into_iter().filter(|c| filter.allows(c)) {
        let mut collection_results =
            validate_collection(Arc::clone(&store), Arc::clone(&validator), &collection, options).await;
        results.append(&mut collection_results);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProbeError;
    use crate::prober::{HttpProber, ProbeResponse};
    use crate::store::InMemoryStore;
    use crate::value::Value;
    use async_trait::async_trait;

    struct AlwaysOkProber;

    #[async_trait]
    impl HttpProber for AlwaysOkProber {
        async fn probe(&self, _url: &str) -> Result<ProbeResponse, ProbeError> {
            Ok(ProbeResponse {
                status: 200,
                status_text: "OK".to_string(),
                content_type: Some("image/jpeg".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn scans_every_document_in_a_collection() {
        let mut store = InMemoryStore::new();
        for i in 0..5 {
            store.put(
                "yachts",
                &i.to_string(),
                Value::mapping([(
                    "coverImage".to_string(),
                    Value::String(format!("https://cdn.example.com/{i}.jpg")),
                )]),
            );
        }

        let store = Arc::new(store);
        let validator = Arc::new(UrlValidator::new(AlwaysOkProber));
        let options = ScanOptions {
            batch_size: 2,
            limit: None,
            skip_validation: false,
        };

        let results = validate_collection(store, validator, "yachts", &options).await;
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn skip_validation_discovers_fields_without_probing() {
        let mut store = InMemoryStore::new();
        store.put(
            "yachts",
            "1",
            Value::mapping([(
                "coverImage".to_string(),
                Value::String("https://cdn.example.com/a.jpg".to_string()),
            )]),
        );

        let store = Arc::new(store);
        let validator = Arc::new(UrlValidator::new(AlwaysOkProber));
        let options = ScanOptions {
            batch_size: 10,
            limit: None,
            skip_validation: true,
        };

        let results = validate_collection(store, validator, "yachts", &options).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].total_urls, 1);
        assert_eq!(results[0].missing_urls, 1);
        assert_eq!(results[0].valid_urls, 0);
        assert!(results[0].fields.is_empty());
    }

    #[tokio::test]
    async fn validate_all_respects_include_filter() {
        let mut store = InMemoryStore::new();
        store.put("yachts", "1", Value::Mapping(Default::default()));
        store.put("brokers", "1", Value::Mapping(Default::default()));

        let store = Arc::new(store);
        let validator = Arc::new(UrlValidator::new(AlwaysOkProber));
        let filter = CollectionFilter {
            include: Some(vec!["yachts".to_string()]),
            exclude: None,
        };

        let results = validate_all(store, validator, &filter, &ScanOptions::default()).await;
        assert!(results.iter().all(|r| r.collection == "yachts"));
    }

    #[tokio::test]
    async fn empty_collection_yields_no_results() {
        let store = Arc::new(InMemoryStore::new());
        let validator = Arc::new(UrlValidator::new(AlwaysOkProber));
        let results = validate_collection(store, validator, "nothing", &ScanOptions::default()).await;
        assert!(results.is_empty());
    }
}
