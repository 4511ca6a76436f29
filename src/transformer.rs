use std::collections::HashSet;
use thiserror::Error;

use crate::config::{TemplateConfig, TitleRules};
use crate::log_sink::SharedLog;
use crate::normalizer::TitleNormalizer;
use crate::types::{LinkOccurrence, NumberedLink, ProcessingResult};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("{0} template is empty")]
    EmptyTemplate(&'static str),
    #[error("link template `{0}` has no {{number}} placeholder")]
    MissingNumberPlaceholder(String),
}

/// Numbers the unique URLs of the selected occurrences in first-seen order.
///
/// Occurrences are ordered by position before grouping, so the representative
/// of each URL is the one closest to the start of the text.
pub fn number_links(occurrences: &[LinkOccurrence]) -> Vec<NumberedLink> {
    let mut selected: Vec<&LinkOccurrence> = occurrences.iter().filter(|o| o.selected).collect();
    selected.sort_by_key(|o| o.position);

    let mut seen = HashSet::new();
    selected
        .into_iter()
        .filter(|o| seen.insert(o.url.clone()))
        .enumerate()
        .map(|(index, occurrence)| NumberedLink {
            url: occurrence.url.clone(),
            number: index + 1,
            occurrence: occurrence.clone(),
        })
        .collect()
}

pub struct TextTransformer {
    templates: TemplateConfig,
    normalizer: TitleNormalizer,
    log: SharedLog,
}

impl TextTransformer {
    pub fn new(templates: TemplateConfig, title_rules: &TitleRules, log: SharedLog) -> Self {
        Self {
            templates,
            normalizer: TitleNormalizer::new(title_rules, log.clone()),
            log,
        }
    }

    /// Replaces every selected link with its numbered placeholder and builds
    /// the reference list. Titles of selected occurrences are normalized in
    /// place.
    pub fn process(
        &self,
        original_text: &str,
        occurrences: &mut [LinkOccurrence],
    ) -> Result<ProcessingResult, TransformError> {
        self.check_templates(true).inspect_err(|e| self.report(e))?;

        for occurrence in occurrences.iter_mut().filter(|o| o.selected) {
            self.normalizer.normalize_in_place(&mut occurrence.title);
        }

        let links = number_links(occurrences);

        let mut processed_text = original_text.to_string();
        for link in &links {
            let token = self.templates.render_link(link.number);
            processed_text = processed_text.replace(&link.occurrence.original_span, &token);
        }

        let reference_list = self.format_reference_list(&links);

        self.log
            .info(&format!("Text processed: {} links numbered", links.len()));

        Ok(ProcessingResult {
            processed_text,
            reference_list: Some(reference_list),
        })
    }

    /// Replaces numbered placeholders with the URLs they stand for.
    pub fn process_reverse(
        &self,
        original_text: &str,
        occurrences: &[LinkOccurrence],
    ) -> Result<ProcessingResult, TransformError> {
        self.check_templates(false).inspect_err(|e| self.report(e))?;

        let links = number_links(occurrences);

        let mut processed_text = original_text.to_string();
        for link in &links {
            let token = self.templates.render_link(link.number);
            processed_text = processed_text.replace(&token, &link.url);
        }

        self.log.info(&format!(
            "Text processed in reverse mode: {} placeholders restored",
            links.len()
        ));

        Ok(ProcessingResult {
            processed_text,
            reference_list: None,
        })
    }

    fn format_reference_list(&self, links: &[NumberedLink]) -> String {
        links
            .iter()
            .map(|link| {
                let title = link.occurrence.title.as_deref().unwrap_or_default();
                let mut line = self
                    .templates
                    .render_reference(link.number, title, &link.url);
                line.push('\n');
                line
            })
            .collect()
    }

    fn check_templates(&self, with_references: bool) -> Result<(), TransformError> {
        let link_template = &self.templates.link_template;
        if link_template.is_empty() {
            return Err(TransformError::EmptyTemplate("link"));
        }
        if !link_template.contains("{number}") {
            return Err(TransformError::MissingNumberPlaceholder(
                link_template.clone(),
            ));
        }
        if with_references && self.templates.reference_template.is_empty() {
            return Err(TransformError::EmptyTemplate("reference"));
        }
        Ok(())
    }

    fn report(&self, error: &TransformError) {
        self.log
            .error(&format!("Failed to process text: {error}"));
    }
}
