//! Media URL Guardian: validates and repairs media URLs embedded in
//! schemaless documents (spec.md §1–§9).

pub mod classifier;
pub mod config;
pub mod document_validator;
pub mod errors;
pub mod path;
pub mod postgres_store;
pub mod prober;
pub mod queue;
pub mod redis_queue;
pub mod repair_executor;
pub mod repair_planner;
pub mod report;
pub mod scan;
pub mod store;
pub mod validator;
pub mod value;
pub mod walker;
pub mod worker;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use classifier::MediaType;
use prober::HttpProber;
use store::DocumentStore;
use validator::{UrlValidator, Verdict};

/// Thin re-export of §4.C for callers that already have a resolved
/// `expected_type` and just want one URL checked.
pub async fn validate_url<P: HttpProber>(validator: &UrlValidator<P>, url: &str, expected_type: Option<MediaType>) -> Verdict {
    validator.validate(url, expected_type).await
}

/// Thin re-export of §4.E.
pub async fn validate_document<S, P>(
    store: &S,
    validator: &UrlValidator<P>,
    collection: &str,
    document_id: &str,
) -> document_validator::DocumentResult
where
    S: DocumentStore,
    P: HttpProber,
{
    document_validator::validate_document(store, validator, collection, document_id).await
}

/// Thin re-export of §4.F.
pub async fn validate_collection<S, P>(
    store: Arc<S>,
    validator: Arc<UrlValidator<P>>,
    collection: &str,
    options: &scan::ScanOptions,
) -> Vec<document_validator::DocumentResult>
where
    S: DocumentStore + 'static,
    P: HttpProber + 'static,
{
    scan::validate_collection(store, validator, collection, options).await
}

/// Thin re-export of §4.G.
pub fn generate_report(
    results: &[document_validator::DocumentResult],
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> report::ValidationReport {
    report::generate_report(results, start_time, end_time)
}

/// Thin re-export of §4.H+§4.I: plans and executes repairs for every
/// invalid result already captured in a persisted report.
pub async fn repair_urls<S: DocumentStore>(
    store: &S,
    report: &report::ValidationReport,
    config: &repair_planner::RepairConfig,
) -> report::RepairReport {
    let plan = repair_planner::plan_from_report(report, config);
    let results = repair_executor::repair_urls(store, plan).await;
    report::generate_repair_report(results)
}

/// Thin re-export of the §4.H relative-URL shortcut, executed immediately.
pub async fn fix_relative_urls<S: DocumentStore>(
    store: &S,
    collection: &str,
    document_id: &str,
    base_url: &str,
) -> report::RepairReport {
    let Ok(Some(document)) = store.get_document(collection, document_id).await else {
        return report::generate_repair_report(Vec::new());
    };
    let plan = repair_planner::find_relative_urls(collection, document_id, &document, base_url);
    let results = repair_executor::repair_urls(store, plan).await;
    report::generate_repair_report(results)
}

/// Thin re-export of the §4.H blob-URL shortcut, executed immediately.
pub async fn resolve_blob_urls<S: DocumentStore>(
    store: &S,
    collection: &str,
    document_id: &str,
    placeholder_url: &str,
) -> report::RepairReport {
    let Ok(Some(document)) = store.get_document(collection, document_id).await else {
        return report::generate_repair_report(Vec::new());
    };
    let plan = repair_planner::find_blob_urls(collection, document_id, &document, placeholder_url);
    let results = repair_executor::repair_urls(store, plan).await;
    report::generate_repair_report(results)
}
