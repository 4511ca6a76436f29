use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use url::Url;

use crate::config::ExtractionConfig;
use crate::log_sink::SharedLog;
use crate::types::LinkOccurrence;

/// Scans text with an ordered list of patterns and returns one occurrence per
/// unique URL, ordered by position.
pub struct LinkExtractor {
    log: SharedLog,
}

impl LinkExtractor {
    pub fn new(log: SharedLog) -> Self {
        Self { log }
    }

    pub fn extract(&self, text: &str, config: &ExtractionConfig) -> Vec<LinkOccurrence> {
        self.extract_with_patterns(text, &config.patterns)
    }

    pub fn extract_with_patterns<S: AsRef<str>>(
        &self,
        text: &str,
        patterns: &[S],
    ) -> Vec<LinkOccurrence> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut links = Vec::new();
        let mut claimed = HashSet::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            match RegexBuilder::new(pattern).multi_line(true).build() {
                Ok(regex) => self.scan(text, &regex, &mut links, &mut claimed),
                Err(e) => self
                    .log
                    .warning(&format!("Skipping extraction pattern `{pattern}`: {e}")),
            }
        }

        let links = dedup_by_url(links);
        self.log
            .info(&format!("Extracted unique links: {}", links.len()));
        links
    }

    fn scan(
        &self,
        text: &str,
        regex: &Regex,
        links: &mut Vec<LinkOccurrence>,
        claimed: &mut HashSet<usize>,
    ) {
        for captures in regex.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if claimed.contains(&whole.start()) {
                continue;
            }

            let Some(candidate) = captures.get(1) else {
                self.log.warning(&format!(
                    "Pattern `{}` matched `{}` without a URL capture group",
                    regex.as_str(),
                    whole.as_str()
                ));
                continue;
            };

            let url = candidate.as_str().trim();
            if !is_valid_url(url) {
                self.log
                    .warning(&format!("Ignoring `{url}`: not an absolute http(s) URL"));
                continue;
            }

            links.push(LinkOccurrence::new(whole.as_str(), url, whole.start()));
            claimed.extend(whole.range());
        }
    }
}

/// Keeps the lowest-position occurrence of every URL, sorted by position.
fn dedup_by_url(mut links: Vec<LinkOccurrence>) -> Vec<LinkOccurrence> {
    links.sort_by_key(|link| link.position);
    let mut seen = HashSet::new();
    links.retain(|link| seen.insert(link.url.clone()));
    links
}

pub fn is_valid_url(candidate: &str) -> bool {
    Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}
