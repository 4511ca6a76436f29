use regex::Regex;

use crate::config::TitleRules;
use crate::log_sink::SharedLog;

/// A title rule after its pattern went through the regex compiler.
enum CompiledRule {
    Ready { regex: Regex, replacement: String },
    Broken { pattern: String, reason: String },
}

/// Applies title rules in sequence; each rule sees the previous rule's output.
pub struct TitleNormalizer {
    rules: Vec<CompiledRule>,
    log: SharedLog,
}

impl TitleNormalizer {
    pub fn new(rules: &TitleRules, log: SharedLog) -> Self {
        let rules = rules
            .iter()
            .map(|rule| match Regex::new(&rule.pattern) {
                Ok(regex) => CompiledRule::Ready {
                    regex,
                    replacement: rule.replacement.clone(),
                },
                Err(e) => CompiledRule::Broken {
                    pattern: rule.pattern.clone(),
                    reason: e.to_string(),
                },
            })
            .collect();

        Self { rules, log }
    }

    pub fn normalize(&self, title: &str) -> String {
        if title.is_empty() {
            return String::new();
        }

        let mut current = title.to_string();
        for rule in &self.rules {
            match rule {
                CompiledRule::Ready { regex, replacement } => {
                    current = regex
                        .replace_all(&current, replacement.as_str())
                        .into_owned();
                }
                CompiledRule::Broken { pattern, reason } => {
                    self.log
                        .warning(&format!("Failed to apply rule '{pattern}': {reason}"));
                }
            }
        }
        current
    }

    /// Normalizes `title` in place; absent and empty titles are left alone.
    pub fn normalize_in_place(&self, title: &mut Option<String>) {
        if let Some(value) = title.as_mut().filter(|t| !t.is_empty()) {
            *value = self.normalize(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TitleRule;
    use crate::log_sink::{LogLevel, MemoryLog};
    use std::sync::Arc;

    fn default_normalizer() -> TitleNormalizer {
        TitleNormalizer::new(&TitleRules::default(), Arc::new(MemoryLog::new()))
    }

    #[test]
    fn test_default_rules() {
        let normalizer = default_normalizer();
        assert_eq!(
            normalizer.normalize("  «Rust»   Book —\n the   „guide“  "),
            "\"Rust\" Book - the \"guide\""
        );
        assert_eq!(normalizer.normalize("A – B"), "A - B");
    }

    #[test]
    fn test_empty_title_untouched() {
        let normalizer = default_normalizer();
        assert_eq!(normalizer.normalize(""), "");

        let mut title = None;
        normalizer.normalize_in_place(&mut title);
        assert_eq!(title, None);

        let mut title = Some(String::new());
        normalizer.normalize_in_place(&mut title);
        assert_eq!(title, Some(String::new()));
    }

    #[test]
    fn test_rules_compose_in_order() {
        let rules = TitleRules(vec![
            TitleRule::new("a", "b"),
            TitleRule::new("b", "c"),
        ]);
        let normalizer = TitleNormalizer::new(&rules, Arc::new(MemoryLog::new()));
        assert_eq!(normalizer.normalize("ab"), "cc");

        let reversed = TitleRules(vec![
            TitleRule::new("b", "c"),
            TitleRule::new("a", "b"),
        ]);
        let normalizer = TitleNormalizer::new(&reversed, Arc::new(MemoryLog::new()));
        assert_eq!(normalizer.normalize("ab"), "bc");
    }

    #[test]
    fn test_capture_group_replacement() {
        let rules = TitleRules(vec![TitleRule::new(r"(\w+) \| Site", "$1")]);
        let normalizer = TitleNormalizer::new(&rules, Arc::new(MemoryLog::new()));
        assert_eq!(normalizer.normalize("Docs | Site"), "Docs");
    }

    #[test]
    fn test_broken_rule_skipped_with_warning() {
        let log = Arc::new(MemoryLog::new());
        let rules = TitleRules(vec![
            TitleRule::new("(", "x"),
            TitleRule::new(r"\s+", "_"),
        ]);
        let normalizer = TitleNormalizer::new(&rules, log.clone());

        assert_eq!(normalizer.normalize("a b"), "a_b");
        let warnings = log.messages_at(LogLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Failed to apply rule '('"));
    }
}
