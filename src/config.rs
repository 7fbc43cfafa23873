use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

// config.toml layout
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub user: UserConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub openrouter_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            openrouter_key: String::new(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_evaluation_model")]
    pub evaluation_model: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            evaluation_model: default_evaluation_model(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    pub concurrent_requests: usize,
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub request_timeout_seconds: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrent_requests: 3,
            request_delay_ms: 500,
            max_retries: 3,
            request_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub db_file: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_file: "ielts_coach.db".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub history_file: String,
    pub audio_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            history_file: "writing_history.csv".to_string(),
            audio_dir: "audio".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub essay_file: String,
    pub prompt: String,
    #[serde(default = "default_speaking_topic")]
    pub speaking_topic: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            essay_file: "essay.txt".to_string(),
            prompt: "Some people think that it is best to work in the same organization for one's whole life. Others think that it is better to change jobs frequently. Discuss both views and give your opinion.".to_string(),
            speaking_topic: default_speaking_topic(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    pub debounce_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self { debounce_ms: 1000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TtsConfig {
    #[serde(default)]
    pub azure_speech_key: String,
    #[serde(default = "default_region")]
    pub azure_speech_region: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            azure_speech_key: String::new(),
            azure_speech_region: default_region(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    pub id: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: "local".to_string(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_evaluation_model() -> String {
    "google/gemini-2.5-pro".to_string()
}

fn default_speaking_topic() -> String {
    "Describe a skill you would like to learn.".to_string()
}

fn default_region() -> String {
    "eastus".to_string()
}

impl Config {
    pub fn load() -> Result<Config> {
        Self::from_path("config.toml")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config_content = std::fs::read_to_string(path)
            .map_err(|_| {
                anyhow::anyhow!("config file {} is missing or unreadable", path.display())
            })?;
        let mut config = Self::parse(&config_content)?;
        config.apply_env();
        Ok(config)
    }

    // Defaults are enough for offline analysis, so a missing file is not fatal
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_path(path);
        }
        tracing::info!("{} not found, using default configuration", path.display());
        let mut config = Config::default();
        config.apply_env();
        Ok(config)
    }

    // environment wins over the file
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                self.api.openrouter_key = key;
            }
        }
        if let Ok(key) = std::env::var("AZURE_SPEECH_KEY") {
            if !key.trim().is_empty() {
                self.tts.azure_speech_key = key;
            }
        }
    }

    pub fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("failed to parse config: {}", e))?;
        if config.processing.concurrent_requests == 0 {
            anyhow::bail!("processing.concurrent_requests must be at least 1");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse("[api]\nopenrouter_key = \"sk-test\"\n").unwrap();
        assert_eq!(config.api.openrouter_key, "sk-test");
        assert_eq!(config.api.base_url, default_base_url());
        assert_eq!(config.assistant.debounce_ms, 1000);
        assert_eq!(config.database.db_file, "ielts_coach.db");
        assert_eq!(config.user.id, "local");
    }

    #[test]
    fn test_full_sections_override_defaults() {
        let content = r#"
[api]
openrouter_key = "k"

[models]
evaluation_model = "openai/gpt-4o"

[processing]
concurrent_requests = 8
request_delay_ms = 10
max_retries = 1
request_timeout_seconds = 30

[assistant]
debounce_ms = 250

[user]
id = "student-7"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.models.evaluation_model, "openai/gpt-4o");
        assert_eq!(config.processing.concurrent_requests, 8);
        assert_eq!(config.assistant.debounce_ms, 250);
        assert_eq!(config.user.id, "student-7");
    }

    #[test]
    fn test_empty_config_matches_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.api.openrouter_key, "");
        assert_eq!(config.api.base_url, default_base_url());
        assert_eq!(config.input.speaking_topic, default_speaking_topic());
    }

    #[test]
    fn test_input_section_without_speaking_topic() {
        let config = Config::parse("[input]\nessay_file = \"a.txt\"\nprompt = \"p\"\n").unwrap();
        assert_eq!(config.input.essay_file, "a.txt");
        assert_eq!(config.input.speaking_topic, default_speaking_topic());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let content = r#"
[api]
[processing]
concurrent_requests = 0
request_delay_ms = 10
max_retries = 1
request_timeout_seconds = 30
"#;
        assert!(Config::parse(content).is_err());
    }

    #[test]
    fn test_missing_file_errors() {
        assert!(Config::from_path("/definitely/not/here/config.toml").is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/definitely/not/here/config.toml").unwrap();
        assert_eq!(config.processing.concurrent_requests, 3);
        assert_eq!(config.input.essay_file, "essay.txt");
    }

    #[test]
    fn test_existing_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\n[database]\ndb_file = \"x.db\"\n").unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.database.db_file, "x.db");
    }
}
