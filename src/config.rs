use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::log_sink::LogSink;

pub const MAX_RECENT_FILES: usize = 10;

pub const MARKDOWN_LINK_PATTERN: &str = r"\[[^\]\n]*\]\(\s*([^)\s]+)\s*\)";
pub const BARE_URL_PATTERN: &str = r#"(https?://[^\s<>()\[\]"']*[^\s<>()\[\]"'.,;:!?])"#;

pub const DEFAULT_LINK_TEMPLATE: &str = "[{number}]";
pub const DEFAULT_REFERENCE_TEMPLATE: &str = "{number}. {title} — {url}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} template cannot be empty")]
    EmptyTemplate(&'static str),
    #[error("invalid regular expression `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("invalid title rule `{0}`: expected `pattern → replacement`")]
    InvalidRule(String),
}

fn check_pattern(pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Ordered extraction patterns. The first capture group of each yields the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub patterns: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                MARKDOWN_LINK_PATTERN.to_string(),
                BARE_URL_PATTERN.to_string(),
            ],
        }
    }
}

impl ExtractionConfig {
    /// Parses one pattern per line, skipping blank lines.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut patterns = Vec::new();
        for line in text.lines() {
            let pattern = line.trim();
            if pattern.is_empty() {
                continue;
            }
            check_pattern(pattern)?;
            patterns.push(pattern.to_string());
        }
        Ok(Self { patterns })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Placeholder written in place of a link, with a `{number}` slot.
    pub link_template: String,
    /// One reference-list line, with `{number}`, `{title}` and `{url}` slots.
    pub reference_template: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            link_template: DEFAULT_LINK_TEMPLATE.to_string(),
            reference_template: DEFAULT_REFERENCE_TEMPLATE.to_string(),
        }
    }
}

impl TemplateConfig {
    pub fn render_link(&self, number: usize) -> String {
        self.link_template.replace("{number}", &number.to_string())
    }

    pub fn render_reference(&self, number: usize, title: &str, url: &str) -> String {
        self.reference_template
            .replace("{number}", &number.to_string())
            .replace("{title}", title)
            .replace("{url}", url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRule {
    pub pattern: String,
    pub replacement: String,
}

impl TitleRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Parses a settings line of the form `pattern → replacement` (or `->`).
    pub fn parse_line(line: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = line.split(['→']).flat_map(|p| p.split("->")).collect();
        let [pattern, replacement] = parts.as_slice() else {
            return Err(ConfigError::InvalidRule(line.to_string()));
        };

        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(ConfigError::InvalidRule(line.to_string()));
        }
        check_pattern(pattern)?;

        Ok(Self::new(pattern, replacement.trim()))
    }

    pub fn to_line(&self) -> String {
        format!("{} → {}", self.pattern, self.replacement)
    }
}

/// Rules applied in order to every non-empty title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleRules(pub Vec<TitleRule>);

impl Default for TitleRules {
    fn default() -> Self {
        Self(vec![
            TitleRule::new(r"\s+", " "),
            TitleRule::new(r"^\s+|\s+$", ""),
            TitleRule::new(r#"[«»„“”"]"#, "\""),
            TitleRule::new("–|—", "-"),
        ])
    }
}

impl TitleRules {
    /// Parses one `pattern → replacement` rule per line. A pattern given
    /// twice keeps its first slot and takes the last replacement.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut rules: Vec<TitleRule> = Vec::new();
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            let rule = TitleRule::parse_line(line)?;
            match rules.iter_mut().find(|r| r.pattern == rule.pattern) {
                Some(existing) => existing.replacement = rule.replacement,
                None => rules.push(rule),
            }
        }
        Ok(Self(rules))
    }

    pub fn to_lines(&self) -> String {
        self.0
            .iter()
            .map(TitleRule::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn iter(&self) -> impl Iterator<Item = &TitleRule> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extraction: ExtractionConfig,
    pub templates: TemplateConfig,
    pub title_rules: TitleRules,
    pub recent_files: Vec<String>,

    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn with_file(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: Some(file_path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Loads the config, falling back to defaults bound to `file_path` when
    /// the file cannot be read or parsed.
    pub fn load_or_default(file_path: impl AsRef<Path>, log: &dyn LogSink) -> Self {
        let path = file_path.as_ref();
        Self::load_from_file(path).unwrap_or_else(|e| {
            log.warning(&format!(
                "Failed to load configuration from {}: {e}",
                path.display()
            ));
            Self::with_file(path)
        })
    }

    pub fn load_from_file(file_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = file_path.as_ref();
        if !path.exists() {
            return Ok(Self::with_file(path));
        }

        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::with_file(path));
        }

        match serde_json::from_str::<Self>(&content) {
            Ok(mut config) => {
                config.file_path = Some(path.to_path_buf());
                Ok(config)
            }
            Err(e) => Err(anyhow::anyhow!("Failed to parse configuration: {}", e)),
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        match &self.file_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.templates.link_template.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate("link"));
        }
        if self.templates.reference_template.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate("reference"));
        }
        for pattern in &self.extraction.patterns {
            check_pattern(pattern)?;
        }
        for rule in self.title_rules.iter() {
            check_pattern(&rule.pattern)?;
        }
        Ok(())
    }

    /// Restores every setting except the recent-files list.
    pub fn reset_to_defaults(&mut self) {
        let recent_files = std::mem::take(&mut self.recent_files);
        let file_path = self.file_path.take();
        *self = Self {
            recent_files,
            file_path,
            ..Self::default()
        };
    }

    pub fn remember_file(&mut self, path: &str) {
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_string());
        self.recent_files.truncate(MAX_RECENT_FILES);
    }

    pub fn forget_file(&mut self, path: &str) {
        self.recent_files.retain(|p| p != path);
    }
}
