//! End-to-end coverage across the queue/scan/repair pipeline that doesn't
//! fit naturally as a single module's inline unit test.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use media_url_guardian::errors::{ProbeError, QueueError};
use media_url_guardian::prober::{HttpProber, ProbeResponse};
use media_url_guardian::queue::{Message, Queue, Receipt, ValidateAllPayload};
use media_url_guardian::repair_planner;
use media_url_guardian::scan::CollectionFilter;
use media_url_guardian::store::{DocumentStore, InMemoryStore};
use media_url_guardian::value::Value;
use media_url_guardian::{repair_urls, validate_collection};

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

/// A queue that, like a Redis list, stores raw payload strings and
/// silently discards whatever fails to parse as a `Message` — `BLPOP`
/// already removed it from the backing list, so there's nothing left to
/// re-deliver or separately ack.
struct RawStringQueue {
    backing: Mutex<Vec<String>>,
    dropped: Mutex<u32>,
}

#[async_trait]
impl Queue for RawStringQueue {
    async fn send(&self, message: &Message) -> Result<(), QueueError> {
        let payload = serde_json::to_string(message).map_err(|e| QueueError::Send(e.to_string()))?;
        self.backing.lock().unwrap().push(payload);
        Ok(())
    }

    async fn receive(&self, max: u32) -> Result<Vec<(Receipt, Message)>, QueueError> {
        let mut backing = self.backing.lock().unwrap();
        let take = (max as usize).min(backing.len());
        let raw: Vec<String> = backing.drain(..take).collect();
        drop(backing);

        let mut parsed = Vec::new();
        for (i, payload) in raw.into_iter().enumerate() {
            match serde_json::from_str::<Message>(&payload) {
                Ok(message) => parsed.push((i.to_string(), message)),
                Err(_) => {
                    *self.dropped.lock().unwrap() += 1;
                }
            }
        }
        Ok(parsed)
    }

    async fn ack(&self, _receipt: &Receipt) -> Result<(), QueueError> {
        Ok(())
    }
}

#[tokio::test]
async fn worker_message_parsing_acks_everything_and_warns_on_the_rest() {
    let queue = RawStringQueue {
        backing: Mutex::new(vec![
            serde_json::to_string(&Message::ValidateAll(ValidateAllPayload {
                filter: CollectionFilter {
                    include: Some(vec!["yachts".to_string()]),
                    exclude: None,
                },
            }))
            .unwrap(),
            "not-json".to_string(),
            "{\"type\":\"UNKNOWN\",\"payload\":{}}".to_string(),
        ]),
        dropped: Mutex::new(0),
    };

    let received = queue.receive(3).await.unwrap();
    assert_eq!(received.len(), 1, "only the well-formed message should parse");
    assert_eq!(*queue.dropped.lock().unwrap(), 2, "both malformed messages are dropped with a warning");
    assert!(queue.backing.lock().unwrap().is_empty(), "all three messages are consumed off the queue, i.e. acked");

    let store = Arc::new(InMemoryStore::new());
    let validator = Arc::new(media_url_guardian::validator::UrlValidator::new(AlwaysOkProber));

    let Message::ValidateAll(payload) = &received[0].1 else {
        panic!("expected VALIDATE_ALL");
    };
    let results = validate_collection(
        Arc::clone(&store),
        Arc::clone(&validator),
        &payload.filter.include.as_ref().unwrap()[0],
        &media_url_guardian::scan::ScanOptions::default(),
    )
    .await;
    assert!(results.is_empty(), "an empty collection still produces a (empty) result set, not an error");
}

#[tokio::test]
async fn relative_url_in_a_media_sequence_repairs_end_to_end() {
    let mut inner = InMemoryStore::new();
    inner.put(
        "yachts",
        "1",
        Value::mapping([(
            "media".to_string(),
            Value::Sequence(vec![
                Value::mapping([("url".to_string(), Value::String("/a.jpg".to_string()))]),
                Value::mapping([(
                    "url".to_string(),
                    Value::String("https://cdn.example.com/b.jpg".to_string()),
                )]),
            ]),
        )]),
    );

    let document = inner.get_document("yachts", "1").await.unwrap().unwrap();
    let plan = repair_planner::find_relative_urls("yachts", "1", &document, "https://cdn.example.com");
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].field_path, "media.0.url");

    let results = media_url_guardian::repair_executor::repair_urls(&inner, plan).await;
    assert!(results[0].results[0].success);

    let updated = inner.get_document("yachts", "1").await.unwrap().unwrap();
    assert_eq!(
        media_url_guardian::walker::read(&updated, &media_url_guardian::path::FieldPath::parse_relaxed("media.0.url")),
        Some(&Value::String("https://cdn.example.com/a.jpg".to_string()))
    );
    assert_eq!(
        media_url_guardian::walker::read(&updated, &media_url_guardian::path::FieldPath::parse_relaxed("media.1.url")),
        Some(&Value::String("https://cdn.example.com/b.jpg".to_string()))
    );
}

#[tokio::test]
async fn repair_urls_from_a_persisted_report_rejects_a_second_run() {
    let mut store = InMemoryStore::new();
    store.put(
        "yachts",
        "1",
        Value::mapping([("coverImage".to_string(), Value::String("/rel.jpg".to_string()))]),
    );

    let validator = media_url_guardian::validator::UrlValidator::new(AlwaysOkProber);
    let document_result = media_url_guardian::validate_document(&store, &validator, "yachts", "1").await;
    let start = chrono::Utc::now();
    let report = media_url_guardian::generate_report(&[document_result], start, chrono::Utc::now());
    assert_eq!(report.invalid_urls, 1);

    let config = repair_planner::RepairConfig {
        base_url: Some("https://cdn.example.com".to_string()),
        placeholder_image_url: None,
        placeholder_video_url: None,
    };

    let first = repair_urls(&store, &report, &config).await;
    assert_eq!(first.total_fields_repaired, 1);

    let second = repair_urls(&store, &report, &config).await;
    assert_eq!(second.total_fields_repaired, 0);
    assert_eq!(
        second.results[0].results[0].error.as_deref(),
        Some("URL does not match expected value")
    );
}
