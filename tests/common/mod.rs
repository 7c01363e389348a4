#![allow(dead_code)]

pub mod fixtures;
pub mod wiremock_helpers;

use spades_icp::config::AppConfig;
use std::path::Path;
use wiremock::MockServer;

pub const DATASET_PATH: &str = "/dataset.csv";
pub const METADATA_PATH: &str = "/metadata";
pub const CLASSIFIER_PATH: &str = "/v1beta/models/test-model:generateContent";
pub const TEST_API_KEY: &str = "test-key";

/// Configuration pointing every source at `server`, with the result cache in `cache_dir`
/// and short retry delays.
pub fn test_config(server: &MockServer, cache_dir: &Path) -> AppConfig {
    let text = format!(
        r#"
[http]
user_agent = "spades-icp-tests/1.0"
request_timeout_secs = 5

[sources]
dataset_url = "{uri}{dataset}"
metadata_endpoint = "{uri}{metadata}"
classifier_endpoint = "{uri}"
classifier_model = "test-model"

[classifier]
api_key_env = "SPADES_ICP_TEST_UNSET_KEY"
max_retries = 2
backoff_delays_ms = [10, 20]

[cache]
dir = '{dir}'
key_prefix = "spades_analysis_"
ttl_days = 7
"#,
        uri = server.uri(),
        dataset = DATASET_PATH,
        metadata = METADATA_PATH,
        dir = cache_dir.display(),
    );

    let config: AppConfig = toml::from_str(&text).expect("test config parses");
    config.validate().expect("test config validates");
    config
}
