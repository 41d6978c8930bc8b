use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use tutor_core::StudentContext;
use tutor_core::providers::{
    AnthropicProvider, DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_OPENAI_BASE_URL, LlmProvider,
    ModelRouter, OpenAiProvider,
};
use tutor_core::runner::DEFAULT_MAX_TURNS;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TutorConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub student: StudentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider_order")]
    pub provider_order: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider_order: default_provider_order(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_provider_order() -> Vec<String> {
    vec!["anthropic".to_string(), "openai".to_string()]
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: AnthropicConfig,
    #[serde(default)]
    pub openai: Option<OpenAiProviderConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_anthropic_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_base_url() -> String {
    DEFAULT_ANTHROPIC_BASE_URL.to_string()
}
fn default_anthropic_model() -> String {
    "claude-sonnet-4-5".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl std::fmt::Debug for OpenAiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProviderConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}
fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

/// Optional facts about the student, rendered into every agent's prompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

impl StudentConfig {
    /// Fresh context seeded with whatever the config provides
    pub fn seed_context(&self) -> StudentContext {
        let mut context = StudentContext::new();
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            context = context.with_student_name(name);
        }
        if let Some(subject) = self.subject.as_deref().filter(|s| !s.trim().is_empty()) {
            context = context.with_current_subject(subject);
        }
        context
    }
}

/// Mask a secret string for safe display in Debug output / logs.
/// Shows first 3 and last 4 chars for keys longer than 7 chars, otherwise "***".
fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "(empty)".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() > 7 {
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "***".to_string()
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tutor")
}

impl TutorConfig {
    /// Load `custom_path`, else `~/.tutor/config.toml`, else the built-in default
    pub fn load(custom_path: &Option<PathBuf>) -> Result<Self> {
        let path = match custom_path {
            Some(path) => path.clone(),
            None => {
                let path = config_dir().join("config.toml");
                if !path.exists() {
                    debug!("No config at {}, using built-in defaults", path.display());
                    return Self::parse(DEFAULT_CONFIG).context("Failed to parse built-in config");
                }
                path
            }
        };

        // Config may hold API keys; refuse group/other-readable files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mode = metadata.permissions().mode();
                if mode & 0o077 != 0 {
                    bail!(
                        "Config file {:?} has overly permissive permissions ({:o}). \
                         It may contain secrets. Fix with: chmod 600 {:?}",
                        path,
                        mode & 0o777,
                        path
                    );
                }
            }
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;

        if config.providers.anthropic.api_key.starts_with("sk-ant-") {
            warn!(
                "API key is hardcoded in config file. For security, use environment variables: api_key = \"${{ANTHROPIC_API_KEY}}\""
            );
        }

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Expand allowlisted environment variables, then parse TOML
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        Ok(toml::from_str(&expanded)?)
    }

    /// Build the failover router over every provider that has an API key
    pub fn build_provider(&self) -> Result<Arc<dyn LlmProvider>> {
        let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();

        for name in &self.model.provider_order {
            match name.as_str() {
                "anthropic" => {
                    let cfg = &self.providers.anthropic;
                    if cfg.api_key.is_empty() {
                        debug!("Skipping anthropic provider: no API key");
                        continue;
                    }
                    providers.push(Box::new(AnthropicProvider::new(
                        cfg.api_key.clone(),
                        cfg.model.clone(),
                        cfg.base_url.clone(),
                        cfg.max_tokens,
                    )?));
                    info!("Anthropic provider initialized (model: {})", cfg.model);
                }
                "openai" => {
                    let Some(cfg) = self.providers.openai.as_ref().filter(|c| !c.api_key.is_empty())
                    else {
                        debug!("Skipping openai provider: no API key");
                        continue;
                    };
                    providers.push(Box::new(OpenAiProvider::new(
                        cfg.api_key.clone(),
                        cfg.model.clone(),
                        cfg.base_url.clone(),
                        cfg.max_tokens,
                    )?));
                    info!("OpenAI provider initialized (model: {})", cfg.model);
                }
                other => warn!("Unknown provider '{}' in [model].provider_order", other),
            }
        }

        if providers.is_empty() {
            bail!(
                "No model provider configured. Set ANTHROPIC_API_KEY or OPENAI_API_KEY, \
                 or add an api_key to {}",
                config_dir().join("config.toml").display()
            );
        }

        let router = ModelRouter::with_failover(providers)?
            .with_max_retries(self.model.max_retries)
            .with_base_retry_delay(Duration::from_millis(self.model.retry_delay_ms));
        info!(
            "Model router ready with {} provider(s), {} attempt(s) each",
            router.provider_count(),
            self.model.max_retries.max(1)
        );
        Ok(Arc::new(router))
    }
}

/// Allowlist of environment variable names that may be expanded in config files.
/// This prevents an attacker who can modify the config from reading arbitrary env vars.
const ALLOWED_ENV_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "CUSTOM_LLM_API_KEY",
    "HOME",
    "USER",
];

fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let mut pos = 0;
    while let Some(start) = result[pos..].find("${") {
        let abs_start = pos + start;
        let Some(end) = result[abs_start..].find('}') else {
            break;
        };
        let var_name = &result[abs_start + 2..abs_start + end];

        if !ALLOWED_ENV_VARS.contains(&var_name) {
            warn!(
                "Skipping expansion of unrecognized env var '{}' in config (not in allowlist)",
                var_name
            );
            // Left as-is so the unexpanded reference is visible
            pos = abs_start + end + 1;
            continue;
        }

        let value = std::env::var(var_name).unwrap_or_default();
        let value_len = value.len();
        result = format!(
            "{}{}{}",
            &result[..abs_start],
            value,
            &result[abs_start + end + 1..]
        );
        pos = abs_start + value_len;
    }
    result
}
