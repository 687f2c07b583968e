//! Repair Executor (spec.md §4.I).
//!
//! Groups plan items by document, reads each document once, compares the
//! current value at each field path against the plan's `oldUrl`
//! (compare-and-set), and applies the minimal set of writes — coalescing
//! every item that lands in the same ancestor sequence into a single
//! sequence rewrite so repeated repairs against one `media` array don't
//! lose updates to each other.

use std::collections::BTreeMap;

use crate::errors::StoreError;
use crate::path::FieldPath;
use crate::repair_planner::RepairPlanItem;
use crate::report::{DocumentRepairResult, RepairResultRecord};
use crate::store::DocumentStore;
use crate::value::Value;
use crate::walker::{self, UpdateSpec};

pub async fn repair_urls<S: DocumentStore>(store: &S, plan: Vec<RepairPlanItem>) -> Vec<DocumentRepairResult> {
    let mut by_document: BTreeMap<(String, String), Vec<RepairPlanItem>> = BTreeMap::new();
    for item in plan {
        by_document
            .entry((item.collection.clone(), item.document_id.clone()))
            .or_default()
            .push(item);
    }

    let mut results = Vec::with_capacity(by_document.len());
    for ((collection, document_id), items) in by_document {
        let doc_result = repair_one_document(store, &collection, &document_id, items).await;
        results.push(doc_result);
    }
    results
}

async fn repair_one_document<S: DocumentStore>(
    store: &S,
    collection: &str,
    document_id: &str,
    items: Vec<RepairPlanItem>,
) -> DocumentRepairResult {
    let document = match store.get_document(collection, document_id).await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            return failed_group(collection, document_id, items, "document not found");
        }
        Err(e) => {
            return failed_group(collection, document_id, items, &e.to_string());
        }
    };

    let mut records = Vec::with_capacity(items.len());
    let mut accepted: Vec<(RepairPlanItem, FieldPath)> = Vec::new();

    for item in items {
        let path = FieldPath::parse_relaxed(&item.field_path);
        let current = walker::read(&document, &path).and_then(|v| v.as_str());

        if current != Some(item.old_url.as_str()) {
            records.push(RepairResultRecord {
                collection: item.collection.clone(),
                document_id: item.document_id.clone(),
                field_path: item.field_path.clone(),
                old_url: item.old_url.clone(),
                new_url: item.new_url.clone(),
                repair_type: item.repair_type,
                success: false,
                error: Some(StoreError::Conflict.to_string()),
            });
            continue;
        }

        accepted.push((item, path));
    }

    if accepted.is_empty() {
        return DocumentRepairResult {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            results: records,
        };
    }

    let updates = coalesce_updates(&document, &accepted);

    match store.update_fields(collection, document_id, &updates).await {
        Ok(()) => {
            for (item, _) in &accepted {
                records.push(RepairResultRecord {
                    collection: item.collection.clone(),
                    document_id: item.document_id.clone(),
                    field_path: item.field_path.clone(),
                    old_url: item.old_url.clone(),
                    new_url: item.new_url.clone(),
                    repair_type: item.repair_type,
                    success: true,
                    error: None,
                });
            }
        }
        Err(e) => {
            for (item, _) in &accepted {
                records.push(RepairResultRecord {
                    collection: item.collection.clone(),
                    document_id: item.document_id.clone(),
                    field_path: item.field_path.clone(),
                    old_url: item.old_url.clone(),
                    new_url: item.new_url.clone(),
                    repair_type: item.repair_type,
                    success: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    DocumentRepairResult {
        collection: collection.to_string(),
        document_id: document_id.to_string(),
        results: records,
    }
}

fn failed_group(
    collection: &str,
    document_id: &str,
    items: Vec<RepairPlanItem>,
    error: &str,
) -> DocumentRepairResult {
    DocumentRepairResult {
        collection: collection.to_string(),
        document_id: document_id.to_string(),
        results: items
            .into_iter()
            .map(|item| RepairResultRecord {
                collection: item.collection,
                document_id: item.document_id,
                field_path: item.field_path,
                old_url: item.old_url,
                new_url: item.new_url,
                repair_type: item.repair_type,
                success: false,
                error: Some(error.to_string()),
            })
            .collect(),
    }
}

/// Computes the minimal update set: mapping-addressed writes pass through
/// as-is; every write that lands under the same ancestor sequence is
/// applied to one in-memory copy of that sequence before being emitted as
/// a single `ReplaceSequence`, so two repairs to the same `media` array
/// coalesce into one parent rewrite instead of the second clobbering the
/// first.
fn coalesce_updates(document: &Value, accepted: &[(RepairPlanItem, FieldPath)]) -> Vec<UpdateSpec> {
    let mut direct = Vec::new();
    let mut sequence_rewrites: BTreeMap<FieldPath, Value> = BTreeMap::new();

    for (item, path) in accepted {
        match walker::write(document, path, Value::String(item.new_url.clone())) {
            Some(UpdateSpec::SetPath { path, value }) => direct.push(UpdateSpec::SetPath { path, value }),
            Some(UpdateSpec::ReplaceSequence { path: ancestor, .. }) => {
                let entry = sequence_rewrites
                    .entry(ancestor.clone())
                    .or_insert_with(|| walker::read(document, &ancestor).cloned().unwrap_or(Value::Null));
                merge_sequence_write(entry, &ancestor, path, item);
            }
            None => {}
        }
    }

    let mut updates: Vec<UpdateSpec> = direct;
    updates.extend(
        sequence_rewrites
            .into_iter()
            .map(|(path, sequence)| UpdateSpec::ReplaceSequence { path, sequence }),
    );
    updates
}

fn merge_sequence_write(sequence: &mut Value, ancestor: &FieldPath, full_path: &FieldPath, item: &RepairPlanItem) {
    let relative = &full_path.segments()[ancestor.segments().len()..];
    let relative_path = FieldPath(relative.to_vec());
    if let Some(update) = walker::write(sequence, &relative_path, Value::String(item.new_url.clone())) {
        walker::apply_update(sequence, &update);
    }
}
