//! HTTP client for the remote detection endpoint.
//!
//! The endpoint accepts a `multipart/form-data` POST with a single file part
//! (field name `image` by default) and answers with a JSON envelope:
//!
//! ```json
//! {"data": [{"xmin": 10.0, "xmax": 52.0, "ymin": 8.0, "ymax": 60.0}, ...]}
//! ```
//!
//! Extra fields per prediction (confidence, class labels) are ignored. Every
//! failure mode on this path, whether transport, status, or body shape, is
//! reported as one upload/inference failure with context attached; the caller
//! never sees a partial detection set.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use crate::bbox::BoundingBox;

/// Default cap on the size of an uploaded image.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Default field name for the file part, matching the upload form.
pub const DEFAULT_UPLOAD_FIELD: &str = "image";

const MAX_RESPONSE_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct PredictionEnvelope {
    data: Vec<BoundingBox>,
}

/// Client for one detection endpoint.
pub struct InferenceClient {
    endpoint: Url,
    agent: ureq::Agent,
    upload_field: String,
    max_upload_bytes: usize,
}

impl InferenceClient {
    /// Build a client for `endpoint`. The URL must parse and use http(s).
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("parse inference endpoint url")?;
        match endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported inference endpoint scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Ok(Self {
            endpoint,
            agent,
            upload_field: DEFAULT_UPLOAD_FIELD.to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        })
    }

    pub fn with_upload_field(mut self, field: &str) -> Self {
        self.upload_field = field.to_string();
        self
    }

    pub fn with_max_upload_bytes(mut self, max_bytes: usize) -> Self {
        self.max_upload_bytes = max_bytes;
        self
    }

    /// Upload the image at `image_path` and return the detected boxes.
    pub fn detect(&self, image_path: &Path) -> Result<Vec<BoundingBox>> {
        let bytes = std::fs::read(image_path)
            .with_context(|| format!("read image {}", image_path.display()))?;
        if bytes.is_empty() {
            return Err(anyhow!("image {} is empty", image_path.display()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(anyhow!(
                "image {} is {} bytes, over the {} byte upload cap",
                image_path.display(),
                bytes.len(),
                self.max_upload_bytes
            ));
        }

        let file_name = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let boundary = make_boundary();
        let body = multipart_body(
            &boundary,
            &self.upload_field,
            &file_name,
            sniff_content_type(&bytes),
            &bytes,
        );

        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .with_context(|| format!("upload image to {}", self.endpoint))?;

        let mut response_body = String::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_string(&mut response_body)
            .context("read inference response")?;

        parse_predictions(&response_body)
            .with_context(|| format!("inference response from {}", self.endpoint))
    }
}

/// Parse a detection response body into bounding boxes.
///
/// The top-level `data` key is required; unknown top-level keys and unknown
/// per-prediction fields are ignored.
pub fn parse_predictions(body: &str) -> Result<Vec<BoundingBox>> {
    let envelope: PredictionEnvelope =
        serde_json::from_str(body).context("parse prediction envelope")?;
    Ok(envelope.data)
}

fn make_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or(0);
    format!("treecount-{:08x}-{:08x}", std::process::id(), nanos)
}

// ureq has no multipart support, so frame the single file part by hand.
fn multipart_body(
    boundary: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let header = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    );
    let trailer = format!("\r\n--{boundary}--\r\n");

    let mut body = Vec::with_capacity(header.len() + bytes.len() + trailer.len());
    body.extend_from_slice(header.as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(trailer.as_bytes());
    body
}

fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        "image/jpeg"
    } else if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_endpoint() {
        let err = InferenceClient::new("ftp://host/upload", Duration::from_secs(5));
        assert!(err.is_err());
        let err = InferenceClient::new("not a url", Duration::from_secs(5));
        assert!(err.is_err());
    }

    #[test]
    fn accepts_http_and_https_endpoints() {
        assert!(InferenceClient::new("http://127.0.0.1:8000/api/upload", Duration::from_secs(5)).is_ok());
        assert!(InferenceClient::new("https://detector.example/api/upload", Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn parses_prediction_envelope() {
        let body = r#"{"data": [
            {"xmin": 0.0, "xmax": 10.0, "ymin": 0.0, "ymax": 10.0},
            {"xmin": 5.5, "xmax": 9.0, "ymin": 1.0, "ymax": 2.0}
        ]}"#;
        let boxes = parse_predictions(body).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].xmax, 10.0);
        assert_eq!(boxes[1].ymin, 1.0);
    }

    #[test]
    fn parses_empty_detection_set() {
        let boxes = parse_predictions(r#"{"data": []}"#).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn ignores_extra_fields() {
        let body = r#"{
            "model": "trees-v2",
            "data": [
                {"xmin": 1.0, "xmax": 2.0, "ymin": 3.0, "ymax": 4.0,
                 "confidence": 0.91, "class": "tree"}
            ]
        }"#;
        let boxes = parse_predictions(body).unwrap();
        assert_eq!(boxes.len(), 1);
    }

    #[test]
    fn rejects_body_without_data_key() {
        assert!(parse_predictions(r#"{"predictions": []}"#).is_err());
        assert!(parse_predictions("not json").is_err());
        assert!(parse_predictions(r#"{"data": [{"xmin": 1.0}]}"#).is_err());
    }

    #[test]
    fn multipart_body_frames_one_file_part() {
        let body = multipart_body("bnd", "image", "tree.jpg", "image/jpeg", b"JPEGDATA");
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("--bnd\r\n"));
        assert!(text.contains("Content-Disposition: form-data; name=\"image\"; filename=\"tree.jpg\"\r\n"));
        assert!(text.contains("Content-Type: image/jpeg\r\n\r\nJPEGDATA"));
        assert!(text.ends_with("\r\n--bnd--\r\n"));
    }

    #[test]
    fn sniffs_image_content_types() {
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n"), "image/png");
        assert_eq!(sniff_content_type(b"GIF89a"), "application/octet-stream");
    }
}
