//! URL Classifier (spec.md §4.A) — pure predicates, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;

const MEDIA_HOST_HINTS: &[&str] = &[
    "cloudinary.com",
    "storage.googleapis.com",
    "firebasestorage.googleapis.com",
    "amazonaws.com",
    "imgix.net",
];

const MEDIA_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".bmp", ".tiff", ".mp4", ".mov", ".avi",
    ".webm", ".ogg", ".mkv", ".flv", ".m4v",
];

const NON_MEDIA_DENYLIST: &[&str] = &["swagger", "api", "json", "xml", "graphql"];

const VIDEO_FIELD_HINTS: &[&str] = &["video", "movie", "clip"];
const IMAGE_FIELD_HINTS: &[&str] = &["image", "photo", "picture", "thumbnail", "cover", "avatar"];

static VIDEO_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\.mp4|\.mov|\.webm|video/|-sbv-|"?dynamic motion"?"#).unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
    Unknown,
}

/// Starts with `/` and is not a scheme URL.
pub fn is_relative(url: &str) -> bool {
    url.starts_with('/') && !url.to_lowercase().starts_with("//")
}

pub fn is_blob(url: &str) -> bool {
    url.to_lowercase().starts_with("blob:")
}

pub fn is_data(url: &str) -> bool {
    url.to_lowercase().starts_with("data:")
}

/// Sub-classifies a `data:` URL's declared media type. Per spec, a data
/// URL is always valid; only `data:image/*` gets a detected type of
/// `Image` — every other declared type, including `data:video/*`, is
/// `Unknown`.
pub fn data_media_type(url: &str) -> MediaType {
    let lower = url.to_lowercase();
    if lower.starts_with("data:image/") {
        MediaType::Image
    } else {
        MediaType::Unknown
    }
}

pub fn detect_video(s: &str) -> bool {
    VIDEO_MARKER_RE.is_match(s)
}

fn has_media_extension(lower: &str) -> bool {
    MEDIA_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn has_media_host_hint(lower: &str) -> bool {
    MEDIA_HOST_HINTS.iter().any(|host| lower.contains(host))
}

fn matches_non_media_denylist(lower: &str) -> bool {
    NON_MEDIA_DENYLIST.iter().any(|term| lower.contains(term))
}

/// True if `s` is a data/blob URL, has a media host hint, has a media
/// extension, or is a plain `http(s)` URL not matching the non-media
/// denylist.
pub fn looks_like_media(s: &str) -> bool {
    let lower = s.to_lowercase();
    if is_data(s) || is_blob(s) {
        return true;
    }
    if has_media_host_hint(&lower) || has_media_extension(&lower) {
        return true;
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return !matches_non_media_denylist(&lower);
    }
    false
}

/// Precedence: URL video markers → video; URL image cues → image;
/// field-name hints → video/image; default image.
pub fn infer_expected_type(field_name: &str, url: &str) -> MediaType {
    let lower_url = url.to_lowercase();
    let lower_field = field_name.to_lowercase();

    if detect_video(&lower_url) {
        return MediaType::Video;
    }
    let image_extensions = [
        ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".bmp", ".tiff",
    ];
    if image_extensions.iter().any(|ext| lower_url.ends_with(ext)) || lower_url.contains("image/") {
        return MediaType::Image;
    }
    if VIDEO_FIELD_HINTS.iter().any(|hint| lower_field.contains(hint)) {
        return MediaType::Video;
    }
    if IMAGE_FIELD_HINTS.iter().any(|hint| lower_field.contains(hint)) {
        return MediaType::Image;
    }
    MediaType::Image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_are_identified() {
        assert!(is_relative("/assets/x.jpg"));
        assert!(!is_relative("https://cdn.example.com/x.jpg"));
        assert!(!is_relative("//cdn.example.com/x.jpg"));
    }

    #[test]
    fn blob_and_data_urls_are_identified() {
        assert!(is_blob("blob:https://example.com/abc"));
        assert!(is_data("data:image/png;base64,abc"));
        assert_eq!(data_media_type("data:image/png;base64,abc"), MediaType::Image);
        assert_eq!(data_media_type("data:video/mp4;base64,abc"), MediaType::Unknown);
        assert_eq!(data_media_type("data:application/pdf;base64,abc"), MediaType::Unknown);
    }

    #[test]
    fn looks_like_media_uses_hints_extensions_and_denylist() {
        assert!(looks_like_media("https://storage.googleapis.com/bucket/x"));
        assert!(looks_like_media("https://cdn.example.com/boat.jpg"));
        assert!(!looks_like_media("https://api.example.com/swagger/v1"));
        assert!(looks_like_media("data:image/png;base64,abc"));
    }

    #[test]
    fn infer_expected_type_follows_precedence() {
        assert_eq!(
            infer_expected_type("coverImage", "https://cdn.example.com/foo-SBV-1.mp4"),
            MediaType::Video
        );
        assert_eq!(
            infer_expected_type("thumbnail", "https://cdn.example.com/boat.jpg"),
            MediaType::Image
        );
        assert_eq!(infer_expected_type("videoClip", "https://cdn.example.com/file"), MediaType::Video);
        assert_eq!(infer_expected_type("coverImage", "https://cdn.example.com/file"), MediaType::Image);
        assert_eq!(infer_expected_type("unrelated", "https://cdn.example.com/file"), MediaType::Image);
    }

    #[test]
    fn detect_video_is_case_insensitive() {
        assert!(detect_video("FOO-SBV-1.MP4"));
        assert!(detect_video("video/mp4"));
        assert!(!detect_video("image/png"));
    }

    #[test]
    fn classifier_is_total_over_inputs() {
        // Every call resolves without panicking for a grab-bag of inputs.
        for input in [
            "",
            "   ",
            "/relative",
            "blob:abc",
            "data:image/png;base64,abc",
            "https://cdn.example.com/a.jpg",
            "ftp://example.com/a.jpg",
        ] {
            let _ = is_relative(input);
            let _ = is_blob(input);
            let _ = is_data(input);
            let _ = looks_like_media(input);
            let _ = infer_expected_type("field", input);
        }
    }
}
