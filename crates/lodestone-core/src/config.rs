use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Distance metric used by the vector store collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Dot,
    Euclid,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::Dot => write!(f, "dot"),
            Self::Euclid => write!(f, "euclid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Window width in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive windows. Must stay below `chunk_size`.
    pub overlap_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub model_name: String,
    pub base_url: String,
    pub device: Option<String>,
    /// Request timeout for embedding calls, in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model_name: "BAAI/bge-large-zh-v1.5".into(),
            base_url: "http://localhost:11434".into(),
            device: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Qdrant URL. `None` selects the in-memory store.
    pub url: Option<String>,
    pub collection_name: String,
    pub vector_size: usize,
    pub distance_metric: DistanceMetric,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            url: None,
            collection_name: "lodestone_docs".into(),
            vector_size: 1024,
            distance_metric: DistanceMetric::Cosine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_top_k: usize,
    /// Results scoring below this are dropped during post-processing.
    pub min_score_threshold: f32,
    /// Result content longer than this is truncated with a trailing ellipsis.
    pub max_content_length: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: 3,
            min_score_threshold: 0.1,
            max_content_length: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunker: ChunkerConfig,
    pub embedder: EmbedderConfig,
    pub retriever: RetrieverConfig,
    pub query: QueryConfig,
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Write the effective configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LODESTONE_EMBED_MODEL") {
            tracing::debug!(model = %v, "embed model overridden from environment");
            self.embedder.model_name = v;
        }
        if let Ok(v) = std::env::var("LODESTONE_EMBED_BASE_URL") {
            self.embedder.base_url = v;
        }
        if let Ok(v) = std::env::var("LODESTONE_QDRANT_URL") {
            self.retriever.url = Some(v);
        }
        if let Ok(v) = std::env::var("LODESTONE_COLLECTION") {
            self.retriever.collection_name = v;
        }
    }

    /// Check the invariants the rest of the system relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunker.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".into()));
        }
        if self.chunker.overlap_size >= self.chunker.chunk_size {
            return Err(ConfigError::Invalid(
                "overlap_size must be smaller than chunk_size".into(),
            ));
        }
        if self.retriever.vector_size == 0 {
            return Err(ConfigError::Invalid("vector_size must be positive".into()));
        }
        if self.retriever.collection_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "collection_name must not be empty".into(),
            ));
        }
        if self.query.default_top_k == 0 {
            return Err(ConfigError::Invalid(
                "default_top_k must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.query.min_score_threshold) {
            return Err(ConfigError::Invalid(
                "min_score_threshold must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.chunker.chunk_size, 500);
        assert_eq!(config.chunker.overlap_size, 50);
        assert_eq!(config.retriever.vector_size, 1024);
        assert_eq!(config.query.default_top_k, 3);
        assert!(config.retriever.url.is_none());
    }

    #[test]
    #[serial]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn parse_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lodestone.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"
[chunker]
chunk_size = 200

[retriever]
collection_name = "manuals"
"#
        )
        .unwrap();

        for key in [
            "LODESTONE_EMBED_MODEL",
            "LODESTONE_EMBED_BASE_URL",
            "LODESTONE_QDRANT_URL",
            "LODESTONE_COLLECTION",
        ] {
            unsafe { std::env::remove_var(key) };
        }

        let config = Config::load(&path).unwrap();
        assert_eq!(config.chunker.chunk_size, 200);
        assert_eq!(config.chunker.overlap_size, 50);
        assert_eq!(config.retriever.collection_name, "manuals");
        assert_eq!(config.query.max_content_length, 1000);
    }

    #[test]
    #[serial]
    fn env_override_wins_over_defaults() {
        let mut config = Config::default();

        unsafe { std::env::set_var("LODESTONE_EMBED_MODEL", "nomic-embed-text") };
        config.apply_env_overrides();
        unsafe { std::env::remove_var("LODESTONE_EMBED_MODEL") };

        assert_eq!(config.embedder.model_name, "nomic-embed-text");
    }

    #[test]
    fn reject_overlap_not_below_chunk_size() {
        let mut config = Config::default();
        config.chunker.overlap_size = config.chunker.chunk_size;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn reject_zero_chunk_size() {
        let mut config = Config::default();
        config.chunker.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_threshold_out_of_range() {
        let mut config = Config::default();
        config.query.min_score_threshold = 1.5;
        assert!(config.validate().is_err());
        config.query.min_score_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_top_k() {
        let mut config = Config::default();
        config.query.default_top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/lodestone.toml");

        let mut config = Config::default();
        config.retriever.collection_name = "saved".into();
        config.save(&path).unwrap();

        let reloaded: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn distance_metric_serde_lowercase() {
        let toml = r#"
[retriever]
distance_metric = "dot"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.retriever.distance_metric, DistanceMetric::Dot);
        assert_eq!(DistanceMetric::Cosine.to_string(), "cosine");
    }
}
