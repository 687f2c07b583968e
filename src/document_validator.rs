//! Document Validator (spec.md §4.E).

use serde::{Deserialize, Serialize};

use crate::classifier;
use crate::path::FieldPath;
use crate::prober::HttpProber;
use crate::store::DocumentStore;
use crate::validator::{MediaTypeDto, UrlValidator, Verdict};
use crate::value::Value;
use crate::walker;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldResult {
    pub collection: String,
    pub document_id: String,
    pub field_path: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    pub collection: String,
    pub document_id: String,
    pub total_urls: u32,
    pub valid_urls: u32,
    pub invalid_urls: u32,
    pub missing_urls: u32,
    pub fields: Vec<FieldResult>,
}

impl DocumentResult {
    fn empty(collection: &str, document_id: &str) -> Self {
        DocumentResult {
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            total_urls: 0,
            valid_urls: 0,
            invalid_urls: 0,
            missing_urls: 0,
            fields: Vec::new(),
        }
    }
}

pub async fn validate_document<S, P>(
    store: &S,
    validator: &UrlValidator<P>,
    collection: &str,
    document_id: &str,
) -> DocumentResult
where
    S: DocumentStore,
    P: HttpProber,
{
    let document = match store.get_document(collection, document_id).await {
        Ok(Some(doc)) => doc,
        Ok(None) | Err(_) => return DocumentResult::empty(collection, document_id),
    };

    let paths = walker::discover(&document);
    let mut result = DocumentResult::empty(collection, document_id);

    for path in paths {
        result.total_urls += 1;
        let field_name = leaf_key_name(&path);

        match walker::read(&document, &path) {
            None => {
                result.missing_urls += 1;
            }
            Some(value) if value.is_empty_or_missing() => {
                result.missing_urls += 1;
            }
            Some(Value::String(url)) => {
                let expected = classifier::infer_expected_type(&field_name, url);
                let verdict = validator.validate(url, Some(expected)).await;
                if verdict.is_valid {
                    result.valid_urls += 1;
                } else {
                    result.invalid_urls += 1;
                }
                result.fields.push(FieldResult {
                    collection: collection.to_string(),
                    document_id: document_id.to_string(),
                    field_path: path.to_string(),
                    verdict,
                });
            }
            Some(_) => {
                // Non-string value at a discovered path: captured as its
                // own verdict rather than aborting the document (§7).
                result.invalid_urls += 1;
                result.fields.push(FieldResult {
                    collection: collection.to_string(),
                    document_id: document_id.to_string(),
                    field_path: path.to_string(),
                    verdict: Verdict {
                        url: String::new(),
                        is_valid: false,
                        http_status: None,
                        http_status_text: None,
                        content_type: None,
                        detected_type: MediaTypeDto::Unknown,
                        expected_type: None,
                        error: Some("field value is not a string".to_string()),
                        validated_at: chrono::Utc::now(),
                    },
                });
            }
        }
    }

    result
}

fn leaf_key_name(path: &FieldPath) -> String {
    path.segments()
        .iter()
        .rev()
        .find_map(|seg| match seg {
            crate::path::Segment::Key(k) => Some(k.clone()),
            crate::path::Segment::Index(_) => None,
        })
        .unwrap_or_default()
}
