use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::log_sink::SharedLog;
use crate::title_fetcher::{REQUEST_TIMEOUT, TitleFetcher};
use crate::types::LinkOccurrence;

/// Per-fetch deadline; a fetch past it counts as a failure for that link only.
pub const DEFAULT_FETCH_TIMEOUT: Duration = REQUEST_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveSummary {
    pub requested: usize,
    pub resolved: usize,
    pub failed: usize,
}

enum FetchOutcome {
    Found(String),
    Missing,
    TimedOut,
}

pub struct TitleResolver<F> {
    fetcher: Arc<F>,
    log: SharedLog,
    timeout: Duration,
}

impl<F: TitleFetcher + 'static> TitleResolver<F> {
    pub fn new(fetcher: Arc<F>, log: SharedLog) -> Self {
        Self {
            fetcher,
            log,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetches titles for every occurrence that has none, all at once, and
    /// returns after every fetch has finished or failed.
    pub async fn resolve(&self, occurrences: &mut [LinkOccurrence]) -> ResolveSummary {
        let mut join_set = JoinSet::new();

        for (index, occurrence) in occurrences.iter().enumerate() {
            if !occurrence.needs_title() {
                continue;
            }

            let fetcher = Arc::clone(&self.fetcher);
            let url = occurrence.url.clone();
            let timeout = self.timeout;
            join_set.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, fetcher.fetch_title(&url)).await
                {
                    Ok(Some(title)) if !title.is_empty() => FetchOutcome::Found(title),
                    Ok(_) => FetchOutcome::Missing,
                    Err(_) => FetchOutcome::TimedOut,
                };
                (index, outcome)
            });
        }

        let mut summary = ResolveSummary {
            requested: join_set.len(),
            ..ResolveSummary::default()
        };

        while let Some(joined) = join_set.join_next().await {
            let (index, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    summary.failed += 1;
                    self.log.error(&format!("Title fetch task failed: {e}"));
                    continue;
                }
            };

            let Some(occurrence) = occurrences.get_mut(index) else {
                continue;
            };

            match outcome {
                FetchOutcome::Found(title) => {
                    self.log.info(&format!("Fetched title: {title}"));
                    occurrence.title = Some(title);
                    summary.resolved += 1;
                }
                FetchOutcome::Missing => {
                    self.log
                        .error(&format!("No title found for {}", occurrence.url));
                    summary.failed += 1;
                }
                FetchOutcome::TimedOut => {
                    self.log.error(&format!(
                        "Fetching title for {} timed out after {:?}",
                        occurrence.url, self.timeout
                    ));
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
