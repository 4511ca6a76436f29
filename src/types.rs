/// One matched link at a specific offset of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOccurrence {
    /// Exact matched substring: a whole markdown construct or a bare URL.
    pub original_span: String,
    pub url: String,
    /// Byte offset of the match in the text it was extracted from.
    pub position: usize,
    pub title: Option<String>,
    pub selected: bool,
}

impl LinkOccurrence {
    pub fn new(original_span: impl Into<String>, url: impl Into<String>, position: usize) -> Self {
        Self {
            original_span: original_span.into(),
            url: url.into(),
            position,
            title: None,
            selected: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// True when no non-empty title has been assigned yet.
    pub fn needs_title(&self) -> bool {
        self.title.as_deref().is_none_or(str::is_empty)
    }

    pub fn display_text(&self) -> String {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => format!("{title} ({})", self.url),
            _ => self.url.clone(),
        }
    }
}

/// Deduplicated, numbered link rebuilt on every processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedLink {
    pub url: String,
    /// 1-based, dense, in first-seen order.
    pub number: usize,
    pub occurrence: LinkOccurrence,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessingResult {
    pub processed_text: String,
    /// Only produced in forward mode.
    pub reference_list: Option<String>,
}

pub fn set_all_selected(links: &mut [LinkOccurrence], selected: bool) {
    for link in links {
        link.selected = selected;
    }
}

pub fn selected_count(links: &[LinkOccurrence]) -> usize {
    links.iter().filter(|l| l.selected).count()
}
