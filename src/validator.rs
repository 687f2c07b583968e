//! URL Validator (spec.md §4.C).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{self, MediaType};
use crate::prober::HttpProber;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub url: String,
    pub is_valid: bool,
    pub http_status: Option<u16>,
    pub http_status_text: Option<String>,
    pub content_type: Option<String>,
    pub detected_type: MediaTypeDto,
    pub expected_type: Option<MediaTypeDto>,
    pub error: Option<String>,
    pub validated_at: DateTime<Utc>,
}

/// Serializable mirror of `classifier::MediaType` — kept separate so the
/// pure classifier module stays free of serde.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTypeDto {
    Image,
    Video,
    Unknown,
}

impl From<MediaType> for MediaTypeDto {
    fn from(value: MediaType) -> Self {
        match value {
            MediaType::Image => MediaTypeDto::Image,
            MediaType::Video => MediaTypeDto::Video,
            MediaType::Unknown => MediaTypeDto::Unknown,
        }
    }
}

impl Verdict {
    fn invalid(
        url: &str,
        error: impl Into<String>,
        http_status: Option<u16>,
        detected_type: MediaTypeDto,
        expected_type: Option<MediaType>,
        now: DateTime<Utc>,
    ) -> Self {
        Verdict {
            url: url.to_string(),
            is_valid: false,
            http_status,
            http_status_text: None,
            content_type: None,
            detected_type,
            expected_type: expected_type.map(Into::into),
            error: Some(error.into()),
            validated_at: now,
        }
    }
}

pub struct UrlValidator<P: HttpProber> {
    prober: P,
}

impl<P: HttpProber> UrlValidator<P> {
    pub fn new(prober: P) -> Self {
        Self { prober }
    }

    pub async fn validate(&self, url: &str, expected_type: Option<MediaType>) -> Verdict {
        let now = Utc::now();

        if url.trim().is_empty() {
            return Verdict::invalid(
                url,
                "URL is empty or undefined",
                Some(400),
                MediaTypeDto::Unknown,
                expected_type,
                now,
            );
        }

        if classifier::is_relative(url) {
            return Verdict::invalid(
                url,
                "Relative URLs are not supported",
                Some(400),
                MediaTypeDto::Unknown,
                expected_type,
                now,
            );
        }

        if classifier::is_blob(url) {
            return Verdict::invalid(
                url,
                "Blob URLs are not supported",
                Some(400),
                MediaTypeDto::Unknown,
                expected_type,
                now,
            );
        }

        if classifier::is_data(url) {
            let detected = classifier::data_media_type(url);
            return Verdict {
                url: url.to_string(),
                is_valid: true,
                http_status: None,
                http_status_text: None,
                content_type: None,
                detected_type: detected.into(),
                expected_type: expected_type.map(Into::into),
                error: None,
                validated_at: now,
            };
        }

        match self.prober.probe(url).await {
            Err(probe_error) => Verdict::invalid(
                url,
                probe_error.message,
                Some(0),
                MediaTypeDto::Unknown,
                expected_type,
                now,
            ),
            Ok(response) if response.status >= 400 => Verdict::invalid(
                url,
                format!("HTTP {}", response.status),
                Some(response.status),
                MediaTypeDto::Unknown,
                expected_type,
                now,
            ),
            Ok(response) => self.classify_success(url, expected_type, response, now),
        }
    }

    fn classify_success(
        &self,
        url: &str,
        expected_type: Option<MediaType>,
        response: crate::prober::ProbeResponse,
        now: DateTime<Utc>,
    ) -> Verdict {
        let content_type = response.content_type.clone().unwrap_or_default();
        let lower_content_type = content_type.to_lowercase();
        let is_image = lower_content_type.starts_with("image/");
        let is_video = lower_content_type.starts_with("video/") || classifier::detect_video(url);

        let detected = if is_image {
            MediaType::Image
        } else if is_video {
            MediaType::Video
        } else {
            MediaType::Unknown
        };

        if matches!(expected_type, Some(MediaType::Image)) && !is_image {
            return Verdict::invalid(
                url,
                format!("Expected image, got {content_type}"),
                Some(response.status),
                detected.into(),
                expected_type,
                now,
            );
        }
        if matches!(expected_type, Some(MediaType::Video)) && !is_video {
            return Verdict::invalid(
                url,
                format!("Expected video, got {content_type}"),
                Some(response.status),
                detected.into(),
                expected_type,
                now,
            );
        }

        Verdict {
            url: url.to_string(),
            is_valid: true,
            http_status: Some(response.status),
            http_status_text: Some(response.status_text),
            content_type: response.content_type,
            detected_type: detected.into(),
            expected_type: expected_type.map(Into::into),
            error: None,
            validated_at: now,
        }
    }
}
