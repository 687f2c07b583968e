//! Report Aggregator (spec.md §4.G) and report data types (§3).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document_validator::{DocumentResult, FieldResult};
use crate::repair_planner::RepairType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub collection: String,
    pub total_urls: u32,
    pub valid_urls: u32,
    pub invalid_urls: u32,
    pub missing_urls: u32,
    pub valid_pct: f64,
    pub invalid_pct: f64,
    pub missing_pct: f64,
}

impl CollectionSummary {
    fn from_totals(collection: String, total: u32, valid: u32, invalid: u32, missing: u32) -> Self {
        let (valid_pct, invalid_pct, missing_pct) = if total == 0 {
            (100.0, 0.0, 0.0)
        } else {
            (
                valid as f64 / total as f64 * 100.0,
                invalid as f64 / total as f64 * 100.0,
                missing as f64 / total as f64 * 100.0,
            )
        };
        CollectionSummary {
            collection,
            total_urls: total,
            valid_urls: valid,
            invalid_urls: invalid,
            missing_urls: missing,
            valid_pct,
            invalid_pct,
            missing_pct,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub total_documents: u32,
    pub total_fields: u32,
    pub valid_urls: u32,
    pub invalid_urls: u32,
    pub missing_urls: u32,
    pub collection_summaries: Vec<CollectionSummary>,
    pub invalid_results: Vec<FieldResult>,
}

/// Computes totals by simple partition sums, groups by collection, and
/// flattens invalid fields. Persistence is the caller's job (via
/// `DocumentStore::save_validation_report`) — this function is pure.
pub fn generate_report(
    results: &[DocumentResult],
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> ValidationReport {
    let mut by_collection: BTreeMap<String, (u32, u32, u32, u32)> = BTreeMap::new();
    let mut invalid_results = Vec::new();

    let mut total_fields = 0u32;
    let mut valid_urls = 0u32;
    let mut invalid_urls = 0u32;
    let mut missing_urls = 0u32;

    for doc in results {
        total_fields += doc.total_urls;
        valid_urls += doc.valid_urls;
        invalid_urls += doc.invalid_urls;
        missing_urls += doc.missing_urls;

        let entry = by_collection.entry(doc.collection.clone()).or_default();
        entry.0 += doc.total_urls;
        entry.1 += doc.valid_urls;
        entry.2 += doc.invalid_urls;
        entry.3 += doc.missing_urls;

        for field in &doc.fields {
            if !field.verdict.is_valid {
                invalid_results.push(field.clone());
            }
        }
    }

    let collection_summaries = by_collection
        .into_iter()
        .map(|(collection, (total, valid, invalid, missing))| {
            CollectionSummary::from_totals(collection, total, valid, invalid, missing)
        })
        .collect();

    ValidationReport {
        id: crate::store::fresh_report_id(),
        start_time,
        end_time,
        duration_ms: (end_time - start_time).num_milliseconds(),
        total_documents: results.len() as u32,
        total_fields,
        valid_urls,
        invalid_urls,
        missing_urls,
        collection_summaries,
        invalid_results,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairResultRecord {
    pub collection: String,
    pub document_id: String,
    pub field_path: String,
    pub old_url: String,
    pub new_url: String,
    pub repair_type: RepairType,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRepairResult {
    pub collection: String,
    pub document_id: String,
    pub results: Vec<RepairResultRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairReport {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub total_documents: u32,
    pub total_fields_repaired: u32,
    pub repairs_by_type: BTreeMap<String, u32>,
    pub results: Vec<DocumentRepairResult>,
}

pub fn generate_repair_report(results: Vec<DocumentRepairResult>) -> RepairReport {
    let mut repairs_by_type: BTreeMap<String, u32> = BTreeMap::new();
    let mut total_fields_repaired = 0u32;

    for doc in &results {
        for item in &doc.results {
            if item.success {
                total_fields_repaired += 1;
                *repairs_by_type.entry(item.repair_type.as_str().to_string()).or_insert(0) += 1;
            }
        }
    }

    RepairReport {
        id: crate::store::fresh_report_id(),
        timestamp: crate::store::now(),
        total_documents: results.len() as u32,
        total_fields_repaired,
        repairs_by_type,
        results,
    }
}
