//! Loader tests for `ClientConfig`.

use super::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn create_test_file(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
    let path = dir.path().join(filename);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn defaults_match_documented_values() {
    let config = ClientConfig::default();
    assert_eq!(config.servers, vec!["http://localhost".to_string()]);
    assert_eq!(config.message_retries_count, 1);
    assert_eq!(config.message_expiration_timeout, 50_000);
    assert_eq!(config.message_expiration_timeout_grow_factor, 1.5);
    assert_eq!(config.message_processing_timeout, 50_000);
    assert_eq!(config.message_processing_timeout_grow_factor, 1.5);
    assert_eq!(config.wait_for_timeout, 30_000);
    assert_eq!(config.access_key, "");
}

#[test]
fn setup_params_use_engine_keys() {
    let params = ClientConfig::default()
        .with_servers([DEVNET_BASE_URL])
        .with_access_key("secret")
        .to_setup_params();

    assert_eq!(params["servers"][0], "net.ton.dev");
    assert_eq!(params["messageRetriesCount"], 1);
    assert_eq!(params["messageExpirationTimeout"], 50_000);
    assert_eq!(params["messageExpirationTimeoutGrowFactor"], 1.5);
    assert_eq!(params["messageProcessingTimeout"], 50_000);
    assert_eq!(params["messageProcessingTimeoutGrowFactor"], 1.5);
    assert_eq!(params["waitForTimeout"], 30_000);
    assert_eq!(params["accessKey"], "secret");
}

#[test]
fn test_detect_format() {
    assert_eq!(detect_format("client.yaml").unwrap(), FileFormat::Yaml);
    assert_eq!(detect_format("client.yml").unwrap(), FileFormat::Yaml);
    assert_eq!(detect_format("client.toml").unwrap(), FileFormat::Toml);
    assert_eq!(detect_format("client.json").unwrap(), FileFormat::Json);
    assert!(matches!(
        detect_format("client.txt"),
        Err(ConfigError::UnsupportedFormat(_))
    ));
    assert!(detect_format("client").is_err());
}

#[test]
fn partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(
        &dir,
        "client.toml",
        r#"
servers = ["net.ton.dev", "main.ton.dev"]
wait_for_timeout = 1000
"#,
    );

    let config = ClientConfig::load(path.to_str().unwrap()).unwrap();
    assert_eq!(config.servers, vec!["net.ton.dev", "main.ton.dev"]);
    assert_eq!(config.wait_for_timeout, 1000);
    assert_eq!(config.message_retries_count, 1);
    assert_eq!(config.message_processing_timeout_grow_factor, 1.5);
}

#[test]
fn yaml_and_json_sources() {
    let yaml: ClientConfig = from_str("message_retries_count: 5\n", FileFormat::Yaml).unwrap();
    assert_eq!(yaml.message_retries_count, 5);

    let json: ClientConfig = from_str(r#"{"access_key": "k"}"#, FileFormat::Json).unwrap();
    assert_eq!(json.access_key, "k");
    assert_eq!(json.servers, ClientConfig::default().servers);
}

#[test]
fn env_substitution_in_content() {
    // SAFETY: the variable name is unique to this test.
    unsafe { std::env::set_var("TONCLIENT_TEST_SUBST_KEY", "from-env") };
    let config: ClientConfig =
        from_str(r#"access_key = "${TONCLIENT_TEST_SUBST_KEY}""#, FileFormat::Toml).unwrap();
    assert_eq!(config.access_key, "from-env");

    assert_eq!(substitute_env_vars("$TONCLIENT_TEST_UNSET_VAR"), "$TONCLIENT_TEST_UNSET_VAR");
}

#[test]
fn test_merge_configs() {
    let base = r#"{ "servers": ["a"], "wait_for_timeout": 10 }"#;
    let overlay = r#"{ "wait_for_timeout": 20 }"#;

    let config: ClientConfig =
        merge_configs(&[(base, FileFormat::Json), (overlay, FileFormat::Json)]).unwrap();
    assert_eq!(config.servers, vec!["a"]);
    assert_eq!(config.wait_for_timeout, 20);
}

#[test]
fn env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "client.json", r#"{"message_retries_count": 2}"#);

    // SAFETY: the prefix is unique to this test.
    unsafe {
        std::env::set_var("TONCLIENTENVTEST_MESSAGE_RETRIES_COUNT", "9");
        std::env::set_var("TONCLIENTENVTEST_SERVERS", "x.ton.dev,y.ton.dev");
    }
    let config =
        ClientConfig::load_with_env(path.to_str().unwrap(), "TONCLIENTENVTEST").unwrap();
    assert_eq!(config.message_retries_count, 9);
    assert_eq!(config.servers, vec!["x.ton.dev", "y.ton.dev"]);
}

#[test]
fn missing_file_is_io_error() {
    let err = ClientConfig::load("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = create_test_file(&dir, "broken.toml", "servers = [\"net.ton.dev\"\n");
    let err = ClientConfig::load(path.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}
