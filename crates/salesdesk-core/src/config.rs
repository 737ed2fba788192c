use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SalesdeskError};

/// Top-level configuration for the Salesdesk service.
///
/// Loaded from `~/.salesdesk/config.toml` by default, then overlaid with the
/// deployment environment variables (see [`SalesdeskConfig::apply_env_overrides`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl SalesdeskConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SalesdeskConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    ///
    /// Empty values are ignored. Values that fail to parse are a config error.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // General / local development.
        if let Some(v) = get("IS_LOCAL_DEV") {
            self.general.local_dev = parse_bool("IS_LOCAL_DEV", &v)?;
        }
        if let Some(v) = get("DEBUG_USER_ID") {
            self.general.debug_user_id = v;
        }
        if let Some(v) = get("DEBUG_USER_EMAIL") {
            self.general.debug_user_email = v;
        }
        if let Some(v) = get("DEBUG_USER_GROUPS") {
            self.general.debug_user_groups = parse_group_list(&v);
        }

        // Completion endpoint.
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            self.openai.endpoint = v;
        }
        if let Some(v) = get("AZURE_OPENAI_KEY") {
            self.openai.api_key = v;
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.openai.api_version = v;
        }
        if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT") {
            self.openai.deployment = v;
        }
        if let Some(v) = get("AZURE_OPENAI_MESSAGE_HISTORY_LIMIT") {
            self.openai.message_history_limit = parse_num("AZURE_OPENAI_MESSAGE_HISTORY_LIMIT", &v)?;
        }
        if let Some(v) = get("AZURE_OPENAI_TEMPERATURE") {
            self.openai.temperature = parse_num("AZURE_OPENAI_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("AZURE_OPENAI_MAX_COMPLETION_TOKENS") {
            self.openai.max_completion_tokens =
                parse_num("AZURE_OPENAI_MAX_COMPLETION_TOKENS", &v)?;
        }
        if let Some(v) = get("AZURE_OPENAI_MAX_TOTAL_TOKENS") {
            self.openai.max_total_tokens = parse_num("AZURE_OPENAI_MAX_TOTAL_TOKENS", &v)?;
        }
        if let Some(v) = get("AZURE_OPENAI_MAX_PROMPT_TOKENS") {
            self.openai.max_prompt_tokens = parse_num("AZURE_OPENAI_MAX_PROMPT_TOKENS", &v)?;
        }

        // Search service.
        if let Some(v) = get("AZURE_AI_SEARCH_ENDPOINT") {
            self.search.endpoint = v;
        }
        if let Some(v) = get("AZURE_AI_SEARCH_KEY") {
            self.search.api_key = v;
        }
        if let Some(v) = get("AZURE_AI_SEARCH_TOP_N_DOCS") {
            self.search.top_n_docs = parse_num("AZURE_AI_SEARCH_TOP_N_DOCS", &v)?;
        }
        if let Some(v) = get("AZURE_OPENAI_SEARCH_INDEX") {
            self.search.grounding_index = v;
        }
        if let Some(v) = get("SALES_GENERAL_GROUP_ID") {
            self.search.general_group_id = v;
        }
        if let Some(v) = get("SALES_SPECIAL_GROUP_ID") {
            self.search.special_group_id = v;
        }
        if let Some(v) = get("SALES_MANAGEMENT_GROUP_ID") {
            self.search.management_group_id = v;
        }
        if let Some(v) = get("SALES_GENERAL_INDEX") {
            self.search.general_indexes = split_list(&v);
        }
        if let Some(v) = get("SALES_SPECIAL_INDEX") {
            self.search.special_indexes = split_list(&v);
        }
        if let Some(v) = get("SALES_MANAGEMENT_INDEX") {
            self.search.management_indexes = split_list(&v);
        }
        if let Some(v) = get("GROUP_TO_INDEX_MAP") {
            self.search.group_to_index = serde_json::from_str(&v).map_err(|e| {
                SalesdeskError::Config(format!("GROUP_TO_INDEX_MAP is not valid JSON: {}", e))
            })?;
        }

        // Blob storage.
        if let Some(v) = get("AZURE_STORAGE_ACCOUNT") {
            self.blob.account = v;
        }
        if let Some(v) = get("AZURE_STORAGE_ENDPOINT") {
            self.blob.endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_STORAGE_SAS_TOKEN") {
            self.blob.sas_token = Some(v);
        }
        if let Some(v) = get("AZURE_STORAGE_CONTAINER_NAME") {
            self.blob.documents_container = v;
        }
        if let Some(v) = get("AZURE_STORAGE_CONTAINER_TELEMETRY_NAME") {
            self.blob.telemetry_container = v;
        }
        if let Some(v) = get("AZURE_STORAGE_CONTAINER_FEEDBACK_NAME") {
            self.blob.feedback_container = v;
        }

        // Timers.
        if let Some(v) = get("EMPTY_CHAT_TIMEOUT") {
            self.chat.empty_chat_timeout_secs = parse_num("EMPTY_CHAT_TIMEOUT", &v)?;
        }
        if let Some(v) = get("SALES_DATA_REFRESH_INTERVAL_SECONDS") {
            self.chat.sales_data_refresh_secs =
                parse_num("SALES_DATA_REFRESH_INTERVAL_SECONDS", &v)?;
        }

        Ok(())
    }

    /// Check that every setting needed to talk to the backing services is present.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("openai.endpoint", &self.openai.endpoint),
            ("openai.api_key", &self.openai.api_key),
            ("openai.deployment", &self.openai.deployment),
            ("search.endpoint", &self.search.endpoint),
            ("search.api_key", &self.search.api_key),
            ("search.grounding_index", &self.search.grounding_index),
            ("blob.account", &self.blob.account),
            ("blob.documents_container", &self.blob.documents_container),
            ("blob.telemetry_container", &self.blob.telemetry_container),
            ("blob.feedback_container", &self.blob.feedback_container),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(SalesdeskError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if self.search.general_indexes.is_empty() {
            return Err(SalesdeskError::Config(
                "search.general_indexes must name at least one index".to_string(),
            ));
        }
        Ok(())
    }

    /// Group id to permitted index names.
    ///
    /// An explicit `group_to_index` wins; otherwise the tiers nest: general
    /// sees the general indexes, special adds its own, management sees all.
    pub fn group_index_map(&self) -> BTreeMap<String, Vec<String>> {
        if !self.search.group_to_index.is_empty() {
            return self.search.group_to_index.clone();
        }
        let s = &self.search;
        let general = s.general_indexes.clone();
        let special: Vec<String> = general
            .iter()
            .chain(s.special_indexes.iter())
            .cloned()
            .collect();
        let management: Vec<String> = special
            .iter()
            .chain(s.management_indexes.iter())
            .cloned()
            .collect();

        let mut map = BTreeMap::new();
        map.insert(s.general_group_id.clone(), general);
        map.insert(s.special_group_id.clone(), special);
        map.insert(s.management_group_id.clone(), management);
        map
    }

    /// Copy with secrets masked, for logging.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.openai.api_key = mask(&copy.openai.api_key);
        copy.search.api_key = mask(&copy.search.api_key);
        copy.blob.sas_token = copy.blob.sas_token.as_deref().map(mask);
        copy
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accepts either a JSON array of ids or a comma-separated list.
fn parse_group_list(value: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(value) {
        Ok(groups) => groups,
        Err(_) => split_list(value),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SalesdeskError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        SalesdeskError::Config(format!("{} must be numeric, got '{}'", key, value))
    })
}

/// Server and local-development settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Bind address for the HTTP server.
    pub host: String,
    pub port: u16,
    /// Directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Fill in missing identity headers with the debug user.
    pub local_dev: bool,
    pub debug_user_id: String,
    pub debug_user_email: String,
    pub debug_user_groups: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            data_dir: "~/.salesdesk/data".to_string(),
            log_level: "info".to_string(),
            local_dev: false,
            debug_user_id: "local-dev-user".to_string(),
            debug_user_email: "local-dev@example.com".to_string(),
            debug_user_groups: vec![DEFAULT_GENERAL_GROUP_ID.to_string()],
        }
    }
}

/// Chat-completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub deployment: String,
    /// Previous messages kept in each request.
    pub message_history_limit: usize,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub max_prompt_tokens: u32,
    pub max_total_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: "2024-02-15-preview".to_string(),
            deployment: String::new(),
            message_history_limit: 10,
            temperature: 0.7,
            max_completion_tokens: 4096,
            max_prompt_tokens: 490_000,
            max_total_tokens: 500_000,
            request_timeout_secs: 120,
        }
    }
}

pub const DEFAULT_GENERAL_GROUP_ID: &str = "15214a1b-5659-4511-910c-78c247d45dae";
pub const DEFAULT_SPECIAL_GROUP_ID: &str = "b8512a5e-9155-4f2d-bff8-1a5d660c4bbb";
pub const DEFAULT_MANAGEMENT_GROUP_ID: &str = "ceb36a9c-0dd8-448c-9d39-627835c30902";

/// Search service and group-scoped index access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
    /// API version for direct index queries.
    pub api_version: String,
    /// Documents retrieved per grounded completion.
    pub top_n_docs: u32,
    /// Document index used to ground completions.
    pub grounding_index: String,
    pub general_group_id: String,
    pub special_group_id: String,
    pub management_group_id: String,
    /// Sales-order indexes; rows from these are aggregated.
    pub general_indexes: Vec<String>,
    pub special_indexes: Vec<String>,
    pub management_indexes: Vec<String>,
    /// Explicit group to index mapping. Empty means derive from the tiers.
    pub group_to_index: BTreeMap<String, Vec<String>>,
    pub request_timeout_secs: u64,
    /// Attempts per index before it is skipped.
    pub max_attempts: u32,
    /// First retry delay; doubles on each further attempt.
    pub backoff_base_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_version: "2023-11-01".to_string(),
            top_n_docs: 5,
            grounding_index: String::new(),
            general_group_id: DEFAULT_GENERAL_GROUP_ID.to_string(),
            special_group_id: DEFAULT_SPECIAL_GROUP_ID.to_string(),
            management_group_id: DEFAULT_MANAGEMENT_GROUP_ID.to_string(),
            general_indexes: vec!["sales-vector".to_string()],
            special_indexes: vec!["cash-telemetry-vector".to_string()],
            management_indexes: vec!["cash-feedback-vector".to_string()],
            group_to_index: BTreeMap::new(),
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 1000,
        }
    }
}

/// Blob storage account and containers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub account: String,
    /// Overrides `https://<account>.blob.core.windows.net` (e.g. an emulator).
    pub endpoint: Option<String>,
    /// Shared access signature appended to every request.
    pub sas_token: Option<String>,
    pub documents_container: String,
    pub telemetry_container: String,
    pub feedback_container: String,
    pub request_timeout_secs: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            endpoint: None,
            sas_token: None,
            documents_container: "documents".to_string(),
            telemetry_container: "telemetry".to_string(),
            feedback_container: "feedback".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Email drafting through the mail provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub graph_endpoint: String,
    /// Attachments above this size are left out of drafts.
    pub max_attachment_bytes: usize,
    /// Display turns handed to the drafting prompt.
    pub history_turns: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Company named in the signature block.
    pub company: String,
    pub request_timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            graph_endpoint: "https://graph.microsoft.com/v1.0".to_string(),
            max_attachment_bytes: 3 * 1024 * 1024,
            history_turns: 10,
            temperature: 0.5,
            max_tokens: 1000,
            company: "Sealed Air Corporation".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Session lifecycle, cache and upload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Empty chats older than this are swept.
    pub empty_chat_timeout_secs: u64,
    /// How long cached sales data stays valid.
    pub sales_data_refresh_secs: u64,
    /// Maximum number of reps held in the sales-data cache.
    pub cache_capacity: usize,
    /// Interval of the background empty-chat sweep.
    pub cleanup_interval_secs: u64,
    pub max_image_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            empty_chat_timeout_secs: 3600,
            sales_data_refresh_secs: 3600,
            cache_capacity: 1000,
            cleanup_interval_secs: 900,
            max_image_bytes: 8 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete_config() -> SalesdeskConfig {
        let mut config = SalesdeskConfig::default();
        config
            .apply_overrides(lookup(&[
                ("AZURE_OPENAI_ENDPOINT", "https://openai.example.com"),
                ("AZURE_OPENAI_KEY", "openai-secret"),
                ("AZURE_OPENAI_DEPLOYMENT", "gpt-4o"),
                ("AZURE_AI_SEARCH_ENDPOINT", "https://search.example.com"),
                ("AZURE_AI_SEARCH_KEY", "search-secret"),
                ("AZURE_OPENAI_SEARCH_INDEX", "product-docs"),
                ("AZURE_STORAGE_ACCOUNT", "salesdata"),
            ]))
            .unwrap();
        config
    }

    #[test]
    fn test_default_values() {
        let config = SalesdeskConfig::default();
        assert_eq!(config.general.port, 8000);
        assert!(!config.general.local_dev);
        assert_eq!(config.openai.api_version, "2024-02-15-preview");
        assert_eq!(config.openai.message_history_limit, 10);
        assert!((config.openai.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.openai.max_completion_tokens, 4096);
        assert_eq!(config.search.top_n_docs, 5);
        assert_eq!(config.search.max_attempts, 3);
        assert_eq!(config.search.general_indexes, vec!["sales-vector"]);
        assert_eq!(config.mail.max_attachment_bytes, 3 * 1024 * 1024);
        assert_eq!(config.chat.empty_chat_timeout_secs, 3600);
        assert_eq!(config.chat.cache_capacity, 1000);
        assert_eq!(config.chat.max_image_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
port = 9100
log_level = "debug"

[search]
general_indexes = ["orders-a", "orders-b"]
"#;
        let file = create_temp_config(content);
        let config = SalesdeskConfig::load(file.path()).unwrap();
        assert_eq!(config.general.port, 9100);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.search.general_indexes, vec!["orders-a", "orders-b"]);
        assert_eq!(config.search.top_n_docs, 5);
        assert_eq!(config.chat.sales_data_refresh_secs, 3600);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(SalesdeskConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = SalesdeskConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.salesdesk/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SalesdeskConfig::default();
        config.search.special_indexes = vec!["telemetry".to_string()];
        config.save(&path).unwrap();

        let reloaded = SalesdeskConfig::load(&path).unwrap();
        assert_eq!(reloaded.search.special_indexes, vec!["telemetry"]);
        assert_eq!(reloaded.openai.api_version, config.openai.api_version);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SalesdeskConfig::default();
        config
            .apply_overrides(lookup(&[
                ("IS_LOCAL_DEV", "true"),
                ("DEBUG_USER_GROUPS", r#"["g1", "g2"]"#),
                ("AZURE_OPENAI_TEMPERATURE", "0.2"),
                ("AZURE_OPENAI_MESSAGE_HISTORY_LIMIT", "4"),
                ("SALES_GENERAL_INDEX", "orders-a, orders-b"),
                ("EMPTY_CHAT_TIMEOUT", "60"),
                ("AZURE_STORAGE_CONTAINER_NAME", "docs"),
            ]))
            .unwrap();

        assert!(config.general.local_dev);
        assert_eq!(config.general.debug_user_groups, vec!["g1", "g2"]);
        assert!((config.openai.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.openai.message_history_limit, 4);
        assert_eq!(config.search.general_indexes, vec!["orders-a", "orders-b"]);
        assert_eq!(config.chat.empty_chat_timeout_secs, 60);
        assert_eq!(config.blob.documents_container, "docs");
    }

    #[test]
    fn test_env_override_rejects_bad_number() {
        let mut config = SalesdeskConfig::default();
        let result = config.apply_overrides(lookup(&[("AZURE_AI_SEARCH_TOP_N_DOCS", "five")]));
        assert!(matches!(result, Err(SalesdeskError::Config(_))));
    }

    #[test]
    fn test_debug_groups_comma_list() {
        let mut config = SalesdeskConfig::default();
        config
            .apply_overrides(lookup(&[("DEBUG_USER_GROUPS", "a, b")]))
            .unwrap();
        assert_eq!(config.general.debug_user_groups, vec!["a", "b"]);
    }

    #[test]
    fn test_validate_reports_missing_settings() {
        let err = SalesdeskConfig::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("openai.endpoint"));
        assert!(msg.contains("search.api_key"));

        assert!(complete_config().validate().is_ok());
    }

    #[test]
    fn test_group_index_map_nests_tiers() {
        let config = SalesdeskConfig::default();
        let map = config.group_index_map();
        assert_eq!(map[DEFAULT_GENERAL_GROUP_ID], vec!["sales-vector"]);
        assert_eq!(
            map[DEFAULT_SPECIAL_GROUP_ID],
            vec!["sales-vector", "cash-telemetry-vector"]
        );
        assert_eq!(
            map[DEFAULT_MANAGEMENT_GROUP_ID],
            vec!["sales-vector", "cash-telemetry-vector", "cash-feedback-vector"]
        );
    }

    #[test]
    fn test_group_index_map_explicit_override() {
        let mut config = SalesdeskConfig::default();
        config
            .apply_overrides(lookup(&[("GROUP_TO_INDEX_MAP", r#"{"team-x": ["idx-1"]}"#)]))
            .unwrap();
        let map = config.group_index_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map["team-x"], vec!["idx-1"]);
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let config = complete_config();
        let redacted = config.redacted();
        assert_eq!(redacted.openai.api_key, "********");
        assert_eq!(redacted.search.api_key, "********");
        assert_eq!(redacted.openai.endpoint, config.openai.endpoint);
    }
}
