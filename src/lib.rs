//! Link extraction, numbering and reference-list generation for text documents.
//!
//! The pipeline is: [`extractor::LinkExtractor`] finds links, the optional
//! [`resolver::TitleResolver`] fills in page titles, and
//! [`transformer::TextTransformer`] swaps links for numbered placeholders
//! (or restores them in reverse mode).

pub mod config;
pub mod extractor;
pub mod log_sink;
pub mod normalizer;
pub mod resolver;
pub mod title_fetcher;
pub mod transformer;
pub mod types;

pub use config::AppConfig;
pub use extractor::LinkExtractor;
pub use log_sink::{LogFacade, LogLevel, LogSink, MemoryLog, SharedLog};
pub use resolver::TitleResolver;
pub use title_fetcher::{HttpTitleFetcher, TitleFetcher};
pub use transformer::{TextTransformer, TransformError};
pub use types::{LinkOccurrence, NumberedLink, ProcessingResult};
