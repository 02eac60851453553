use serde::{Deserialize, Serialize};

/// Environment variable consulted when `api.token` is empty.
pub const TOKEN_ENV: &str = "MVM_API_TOKEN";

/// Settings from config.toml. Every section may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub local_server: LocalServerConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub today: TodayConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl Settings {
    /// The configured token, or the environment fallback.
    pub fn api_token(&self) -> String {
        let token = self.api.token.trim();
        if !token.is_empty() {
            return token.to_string();
        }
        std::env::var(TOKEN_ENV).unwrap_or_default().trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Web app address used for deep-links
    #[serde(default = "default_app_url")]
    pub app_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            token: String::new(),
            base_url: default_base_url(),
            app_url: default_app_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// The desktop app's local API server, tried before the public API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_local_host")]
    pub host: String,
    #[serde(default = "default_local_port")]
    pub port: u16,
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        LocalServerConfig {
            enabled: false,
            host: default_local_host(),
            port: default_local_port(),
        }
    }
}

/// Optional detail fields on top-level task lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_true")]
    pub show_due_date: bool,
    #[serde(default = "default_true")]
    pub show_start_date: bool,
    #[serde(default = "default_true")]
    pub show_scheduled_date: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig {
            show_due_date: true,
            show_start_date: true,
            show_scheduled_date: true,
        }
    }
}

/// Which lists the today import pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodayFilter {
    Due,
    Scheduled,
    #[default]
    Both,
}

impl TodayFilter {
    pub fn parse(value: &str) -> Option<TodayFilter> {
        match value.trim().to_ascii_lowercase().as_str() {
            "due" => Some(TodayFilter::Due),
            "scheduled" => Some(TodayFilter::Scheduled),
            "both" => Some(TodayFilter::Both),
            _ => None,
        }
    }

    pub fn includes_due(self) -> bool {
        matches!(self, TodayFilter::Due | TodayFilter::Both)
    }

    pub fn includes_scheduled(self) -> bool {
        matches!(self, TodayFilter::Scheduled | TodayFilter::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodayConfig {
    #[serde(default)]
    pub tasks: TodayFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Vault root; mirrored documents live under `base_dir` inside it
    #[serde(default = "default_vault_dir")]
    pub vault_dir: String,
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    /// Upper bound on categories processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            vault_dir: default_vault_dir(),
            base_dir: default_base_dir(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Send mark-done requests for tasks checked off in a watched document
    #[serde(default)]
    pub mark_done: bool,
    /// Lines around an edit treated as visible
    #[serde(default = "default_viewport_lines")]
    pub viewport_lines: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            mark_done: false,
            viewport_lines: default_viewport_lines(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://serv.amazingmarvin.com/api".to_string()
}

fn default_app_url() -> String {
    "https://app.amazingmarvin.com/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_local_host() -> String {
    "localhost".to_string()
}

fn default_local_port() -> u16 {
    12082
}

fn default_vault_dir() -> String {
    ".".to_string()
}

fn default_base_dir() -> String {
    "AmazingMarvin".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_viewport_lines() -> usize {
    60
}
