use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

use super::{CLASSIFIER_PATH, DATASET_PATH, METADATA_PATH};

/// Matches requests whose query string carries `key`, whatever its value.
pub struct HasQueryKey(pub &'static str);

impl Match for HasQueryKey {
    fn matches(&self, request: &Request) -> bool {
        request.url.query_pairs().any(|(key, _)| key == self.0)
    }
}

/// Wraps a judgement object the way the generative API returns it.
pub fn classifier_response(judgement: Value) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": judgement.to_string() }]
            },
            "finishReason": "STOP"
        }]
    })
}

/// Serves `csv` at the dataset path.
pub async fn mount_dataset(server: &MockServer, csv: &str) {
    Mock::given(method("GET"))
        .and(path(DATASET_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(csv.to_string())
                .insert_header("content-type", "text/csv"),
        )
        .mount(server)
        .await;
}

/// Serves `body` as metadata for any target.
pub async fn mount_metadata(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(METADATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Answers every request on `request_path` with `status`.
pub async fn mount_status(server: &MockServer, http_method: &str, request_path: &str, status: u16) {
    Mock::given(method(http_method))
        .and(path(request_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Answers classifier calls with `judgement`, optionally after `delay`.
pub async fn mount_classifier(server: &MockServer, judgement: Value, delay: Option<Duration>) {
    let mut template = ResponseTemplate::new(200).set_body_json(classifier_response(judgement));
    if let Some(delay) = delay {
        template = template.set_delay(delay);
    }
    Mock::given(method("POST"))
        .and(path(CLASSIFIER_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Number of requests `server` received on `request_path`.
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .count()
}
