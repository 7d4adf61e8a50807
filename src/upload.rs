//! Upload collaborator boundary: multipart wire format and the sink trait
//! the editing core hands its outputs to.
//!
//! The core never performs network I/O. It builds the exact byte payload and
//! fires it at a [`SaveSink`]; transport, retries and completion reporting
//! belong to the embedding application.

use xxhash_rust::xxh3::Xxh3;

use crate::error::{InklayError, InklayResult};

/// MIME type of the uploaded image part.
pub const IMAGE_MIME: &str = "image/jpg";

/// Metadata attached to every upload, fixed per embedding application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadMeta {
    pub app_id: String,
    pub original_url: String,
    pub file_name: String,
}

/// Final upload payload: JPEG bytes plus their form metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub image_bytes: Vec<u8>,
    pub app_id: String,
    pub original_url: String,
    pub file_name: String,
}

/// Where a saved document goes. `save_local` persists PNG bytes on device;
/// `upload` is fire-and-forget relative to the editing core — failures are
/// reported back asynchronously via
/// [`crate::session::EditSession::notify_transport_error`].
pub trait SaveSink {
    fn save_local(&mut self, png: &[u8]) -> InklayResult<()>;
    fn upload(&mut self, request: UploadRequest);
}

/// Response of the upload-target discovery endpoint.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadTargetResponse {
    pub url: String,
}

/// Parse the discovery endpoint's JSON body.
pub fn parse_upload_target(json: &[u8]) -> InklayResult<UploadTargetResponse> {
    serde_json::from_slice(json)
        .map_err(|e| InklayError::transport(format!("invalid upload target response: {e}")))
}

/// Build the multipart/form-data body for `request` per RFC 2046: one part
/// per metadata key, then the `image` part with filename and content type.
///
/// Returns `(content_type_header_value, body)`. The boundary is derived from
/// the request payload, so identical requests produce identical bytes.
pub fn multipart_body(request: &UploadRequest) -> (String, Vec<u8>) {
    let boundary = boundary_for(request);
    let line_break = "\r\n";

    let mut body = Vec::new();
    let mut push = |s: &str| body.extend_from_slice(s.as_bytes());

    for (key, value) in [
        ("appid", request.app_id.as_str()),
        ("original", request.original_url.as_str()),
    ] {
        push(&format!("--{boundary}{line_break}"));
        push(&format!(
            "Content-Disposition: form-data; name=\"{key}\"{line_break}{line_break}"
        ));
        push(&format!("{value}{line_break}"));
    }

    push(&format!("--{boundary}{line_break}"));
    push(&format!(
        "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"{line_break}",
        request.file_name
    ));
    push(&format!("Content-Type: {IMAGE_MIME}{line_break}{line_break}"));
    body.extend_from_slice(&request.image_bytes);
    body.extend_from_slice(line_break.as_bytes());
    body.extend_from_slice(format!("--{boundary}--{line_break}").as_bytes());

    (format!("multipart/form-data; boundary={boundary}"), body)
}

fn boundary_for(request: &UploadRequest) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(request.app_id.as_bytes());
    hasher.update(request.original_url.as_bytes());
    hasher.update(request.file_name.as_bytes());
    hasher.update(&request.image_bytes);
    format!("Boundary-{:032x}", hasher.digest128())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> UploadRequest {
        UploadRequest {
            image_bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            app_id: "someone@example.com".to_string(),
            original_url: "https://example.com/cat.jpg".to_string(),
            file_name: "someone_image_5-2-22".to_string(),
        }
    }

    #[test]
    fn body_contains_each_part_once_and_terminates() {
        let (content_type, body) = multipart_body(&request());
        let text = String::from_utf8_lossy(&body);

        assert!(content_type.starts_with("multipart/form-data; boundary=Boundary-"));
        assert_eq!(text.matches("name=\"appid\"").count(), 1);
        assert_eq!(text.matches("name=\"original\"").count(), 1);
        assert_eq!(
            text.matches("name=\"image\"; filename=\"someone_image_5-2-22\"")
                .count(),
            1
        );
        assert_eq!(text.matches("Content-Type: image/jpg").count(), 1);

        let boundary = content_type.split("boundary=").nth(1).unwrap();
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn body_is_deterministic_for_identical_requests() {
        let a = multipart_body(&request());
        let b = multipart_body(&request());
        assert_eq!(a, b);
    }

    #[test]
    fn different_payloads_use_different_boundaries() {
        let mut other = request();
        other.image_bytes.push(0x00);
        let (ct_a, _) = multipart_body(&request());
        let (ct_b, _) = multipart_body(&other);
        assert_ne!(ct_a, ct_b);
    }

    #[test]
    fn parse_upload_target_roundtrip() {
        let parsed = parse_upload_target(br#"{"url":"https://example.com/up"}"#).unwrap();
        assert_eq!(parsed.url, "https://example.com/up");
        assert!(matches!(
            parse_upload_target(b"not json").unwrap_err(),
            InklayError::Transport(_)
        ));
    }
}
