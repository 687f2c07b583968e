//! Document Store interface (spec.md §6) — an external collaborator.
//!
//! The core never depends on a concrete store; it only calls through
//! this trait. `postgres_store::PostgresStore` is the reference backing
//! implementation; `InMemoryStore` here is a deterministic test double
//! used across the crate's own test suite.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::StoreError;
use crate::path::FieldPath;
use crate::report::{RepairReport, ValidationReport};
use crate::value::Value;
use crate::walker::{self, UpdateSpec};

#[derive(Debug, Clone)]
pub struct Page {
    pub documents: Vec<(String, Value)>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn set_document(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError>;

    /// Applies path-addressed field updates to one document. The caller
    /// (repair executor) has already computed the minimal set of
    /// `UpdateSpec`s, including any ancestor-sequence rewrites (§4.I).
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        updates: &[UpdateSpec],
    ) -> Result<(), StoreError>;

    async fn page_collection(
        &self,
        collection: &str,
        page_token: Option<&str>,
        limit: u32,
    ) -> Result<Page, StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    async fn save_validation_report(&self, report: &ValidationReport) -> Result<(), StoreError>;
    async fn load_validation_report(&self, id: &str) -> Result<Option<ValidationReport>, StoreError>;
    async fn save_repair_report(&self, report: &RepairReport) -> Result<(), StoreError>;
}

/// Deterministic in-process store used by the crate's own tests and by
/// example wiring that doesn't need a real Postgres instance.
#[derive(Default)]
pub struct InMemoryStore {
    documents: Mutex<BTreeMap<(String, String), Value>>,
    validation_reports: Mutex<HashMap<String, ValidationReport>>,
    repair_reports: Mutex<HashMap<String, RepairReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, collection: &str, id: &str, value: Value) {
        self.documents
            .get_mut()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), value);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn set_document(&self, collection: &str, id: &str, value: Value) -> Result<(), StoreError> {
        self.documents
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), value);
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        updates: &[UpdateSpec],
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().unwrap();
        let key = (collection.to_string(), id.to_string());
        let doc = documents
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        for update in updates {
            walker::apply_update(doc, update);
        }
        Ok(())
    }

    async fn page_collection(
        &self,
        collection: &str,
        page_token: Option<&str>,
        limit: u32,
    ) -> Result<Page, StoreError> {
        let documents = self.documents.lock().unwrap();
        let mut matching: Vec<(String, Value)> = documents
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), v)| (id.clone(), v.clone()))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        let start = page_token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let end = (start + limit as usize).min(matching.len());
        let page = matching[start.min(matching.len())..end].to_vec();
        let next_page_token = if end < matching.len() {
            Some(end.to_string())
        } else {
            None
        };

        Ok(Page {
            documents: page,
            next_page_token,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let documents = self.documents.lock().unwrap();
        let mut collections: Vec<String> = documents.keys().map(|(c, _)| c.clone()).collect();
        collections.sort();
        collections.dedup();
        Ok(collections)
    }

    async fn save_validation_report(&self, report: &ValidationReport) -> Result<(), StoreError> {
        self.validation_reports
            .lock()
            .unwrap()
            .insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn load_validation_report(&self, id: &str) -> Result<Option<ValidationReport>, StoreError> {
        Ok(self.validation_reports.lock().unwrap().get(id).cloned())
    }

    async fn save_repair_report(&self, report: &RepairReport) -> Result<(), StoreError> {
        self.repair_reports
            .lock()
            .unwrap()
            .insert(report.id.clone(), report.clone());
        Ok(())
    }
}

pub fn fresh_report_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Reads the current value at `path` for the compare-and-set check the
/// repair executor performs before writing (§4.I step 3).
pub fn read_current(document: &Value, path: &FieldPath) -> Option<String> {
    walker::read(document, path).and_then(|v| v.as_str().map(|s| s.to_string()))
}
