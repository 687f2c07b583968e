//! Repair Planner (spec.md §4.H).

use serde::{Deserialize, Serialize};

use crate::document_validator::FieldResult;
use crate::path::FieldPath;
use crate::report::ValidationReport;
use crate::validator::MediaTypeDto;
use crate::value::Value;
use crate::walker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairType {
    RelativeUrlFix,
    BlobUrlResolve,
    MediaTypeCorrection,
    PlaceholderInsertion,
}

impl RepairType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairType::RelativeUrlFix => "RELATIVE_URL_FIX",
            RepairType::BlobUrlResolve => "BLOB_URL_RESOLVE",
            RepairType::MediaTypeCorrection => "MEDIA_TYPE_CORRECTION",
            RepairType::PlaceholderInsertion => "PLACEHOLDER_INSERTION",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairPlanItem {
    pub collection: String,
    pub document_id: String,
    pub field_path: String,
    pub old_url: String,
    pub new_url: String,
    pub repair_type: RepairType,
}

#[derive(Debug, Clone)]
pub struct RepairConfig {
    pub base_url: Option<String>,
    pub placeholder_image_url: Option<String>,
    pub placeholder_video_url: Option<String>,
}

/// Builds a plan from a previously persisted report's invalid results.
/// Unrepairable invalid results are silently dropped — the executor only
/// ever sees items the planner believes it can fix; an unrepairable count
/// is the caller's job to report (see `worker::RepairOutcome`).
pub fn plan_from_report(report: &ValidationReport, config: &RepairConfig) -> Vec<RepairPlanItem> {
    report
        .invalid_results
        .iter()
        .filter_map(|field| plan_for_field(field, config))
        .collect()
}

fn plan_for_field(field: &FieldResult, config: &RepairConfig) -> Option<RepairPlanItem> {
    let old_url = field.verdict.url.clone();

    if crate::classifier::is_relative(&old_url) {
        if let Some(base_url) = &config.base_url {
            return Some(make_item(field, old_url.clone(), format!("{base_url}{old_url}"), RepairType::RelativeUrlFix));
        }
    }

    if crate::classifier::is_blob(&old_url) {
        if let Some(placeholder) = &config.placeholder_image_url {
            return Some(make_item(field, old_url, placeholder.clone(), RepairType::BlobUrlResolve));
        }
    }

    if is_type_mismatch(field) {
        let placeholder = match field.verdict.expected_type {
            Some(MediaTypeDto::Video) => config.placeholder_video_url.clone(),
            _ => config.placeholder_image_url.clone(),
        };
        if let Some(placeholder) = placeholder {
            return Some(make_item(field, old_url, placeholder, RepairType::MediaTypeCorrection));
        }
    }

    // Remaining hard failures: fall back to a type-appropriate placeholder
    // if one is configured, else the item is unrepairable.
    let placeholder = match field.verdict.expected_type {
        Some(MediaTypeDto::Video) => config.placeholder_video_url.clone(),
        _ => config.placeholder_image_url.clone(),
    };
    placeholder.map(|p| make_item(field, old_url, p, RepairType::PlaceholderInsertion))
}

fn is_type_mismatch(field: &FieldResult) -> bool {
    matches!(
        (field.verdict.expected_type, field.verdict.detected_type),
        (Some(MediaTypeDto::Image), MediaTypeDto::Video) | (Some(MediaTypeDto::Video), MediaTypeDto::Image)
    )
}

fn make_item(field: &FieldResult, old_url: String, new_url: String, repair_type: RepairType) -> RepairPlanItem {
    RepairPlanItem {
        collection: field.collection.clone(),
        document_id: field.document_id.clone(),
        field_path: field.field_path.clone(),
        old_url,
        new_url,
        repair_type,
    }
}

/// Re-scans a document tree for relative-URL fields without requiring a
/// prior report (§4.H shortcut).
pub fn find_relative_urls(collection: &str, document_id: &str, document: &Value, base_url: &str) -> Vec<RepairPlanItem> {
    find_by_predicate(
        collection,
        document_id,
        document,
        crate::classifier::is_relative,
        |old| format!("{base_url}{old}"),
        RepairType::RelativeUrlFix,
    )
}

/// Re-scans a document tree for `blob:` fields without requiring a prior
/// report (§4.H shortcut).
pub fn find_blob_urls(collection: &str, document_id: &str, document: &Value, placeholder_url: &str) -> Vec<RepairPlanItem> {
    find_by_predicate(
        collection,
        document_id,
        document,
        crate::classifier::is_blob,
        |_| placeholder_url.to_string(),
        RepairType::BlobUrlResolve,
    )
}

fn find_by_predicate(
    collection: &str,
    document_id: &str,
    document: &Value,
    predicate: impl Fn(&str) -> bool,
    new_url_for: impl Fn(&str) -> String,
    repair_type: RepairType,
) -> Vec<RepairPlanItem> {
    let mut items = Vec::new();
    for path in walker::discover(document) {
        if let Some(Value::String(url)) = walker::read(document, &path) {
            if predicate(url) {
                items.push(RepairPlanItem {
                    collection: collection.to_string(),
                    document_id: document_id.to_string(),
                    field_path: path.to_string(),
                    old_url: url.clone(),
                    new_url: new_url_for(url),
                    repair_type,
                });
            }
        }
    }
    items
}

pub fn parse_field_path(item: &RepairPlanItem) -> FieldPath {
    FieldPath::parse_relaxed(&item.field_path)
}
