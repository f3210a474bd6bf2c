use super::*;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.ollama.protocol, "http");
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 0);
    assert_eq!(config.cache.freshness_days, 7);
    assert!(config.sources.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_validation() {
    let config = Config::default();

    let mut invalid = config.clone();
    invalid.ollama.protocol = "ftp".to_string();
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid = config.clone();
    invalid.ollama.port = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.ollama.chat_model = "  ".to_string();
    assert!(matches!(invalid.validate(), Err(ConfigError::InvalidModel(_))));

    let mut invalid = config.clone();
    invalid.ollama.batch_size = 1001;
    assert!(invalid.validate().is_err());

    let mut invalid = config;
    invalid.ollama.temperature = 3.5;
    assert!(matches!(
        invalid.validate(),
        Err(ConfigError::InvalidTemperature(_))
    ));
}

#[test]
fn chunking_validation() {
    let mut config = Config::default();
    config.chunking.chunk_size = 50;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidChunkSize(50))
    ));

    let mut config = Config::default();
    config.chunking.chunk_overlap = config.chunking.chunk_size;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::OverlapTooLarge(1000, 1000))
    ));
}

#[test]
fn retrieval_validation() {
    let mut config = Config::default();
    config.retrieval.k_increment = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidRetrievalWindow(..))
    ));

    let mut config = Config::default();
    config.retrieval.min_score = 1.5;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidMinScore(_))
    ));

    let mut config = Config::default();
    config.retrieval.min_passages = 0;
    assert!(config.validate().is_err());
}

#[test]
fn app_name_must_be_single_segment() {
    let mut config = Config::default();
    config.cache.app_name = "../escape".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidAppName(_))
    ));

    config.cache.app_name = "WhatsAppAI".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn sources_must_be_http_urls() {
    let mut config = Config::default();
    config.sources = vec!["https://docs.mapeo.app".to_string()];
    assert!(config.validate().is_ok());

    config.sources.push("ftp://files.example.com".to_string());
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidSource(..))
    ));

    config.sources = vec!["not a url".to_string()];
    assert!(config.validate().is_err());
}

#[test]
fn ollama_url_generation() {
    let mut config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");

    config.ollama.protocol = "https".to_string();
    config.ollama.host = "secure.example.com".to_string();
    config.ollama.port = 443;
    let url = config
        .ollama_url()
        .expect("should generate https url successfully");
    assert_eq!(url.as_str(), "https://secure.example.com/");
}

#[test]
fn snapshot_paths_are_scoped_by_app_name() {
    let mut config = Config {
        base_dir: PathBuf::from("/tmp/assistant"),
        ..Config::default()
    };
    config.cache.app_name = "WhatsAppAI".to_string();

    assert_eq!(
        config.passages_snapshot_path(),
        PathBuf::from("/tmp/assistant/WhatsAppAI/passages.json")
    );
    assert_eq!(
        config.index_snapshot_path(),
        PathBuf::from("/tmp/assistant/WhatsAppAI/index.json")
    );
    assert_eq!(
        config.history_database_path(),
        PathBuf::from("/tmp/assistant/WhatsAppAI/history.db")
    );
}

#[test]
fn toml_serialization() {
    let mut config = Config::default();
    config.sources = vec![
        "https://docs.mapeo.app".to_string(),
        "https://docs.terrastories.app".to_string(),
    ];
    config.cache.manifest_comparison = ManifestComparison::Ordered;

    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let toml_str = r#"
        sources = ["https://docs.mapeo.app"]

        [cache]
        freshness_days = 3

        [assistant]
        empty_context_policy = "ask_model"
    "#;

    let config: Config = toml::from_str(toml_str).expect("should parse toml correctly");
    assert_eq!(config.cache.freshness_days, 3);
    assert_eq!(config.cache.app_name, "docs-assistant");
    assert_eq!(
        config.assistant.empty_context_policy,
        EmptyContextPolicy::AskModel
    );
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn load_missing_config_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("missing config should load");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.ollama, OllamaConfig::default());
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.sources = vec!["https://docs.mapeo.app".to_string()];
    config.retrieval.min_score = 0.85;
    config.save().expect("should save config");

    let loaded = Config::load(temp_dir.path()).expect("should load config");
    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nchunk_size = 10\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}
