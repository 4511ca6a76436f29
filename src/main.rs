use std::{
    env, fs,
    fs::File,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use log::{error, info};
use simplelog::{LevelFilter, WriteLogger};

use linkref::{
    AppConfig, HttpTitleFetcher, LinkExtractor, LogLevel, LogSink, MemoryLog, SharedLog,
    TextTransformer, TitleResolver, types::selected_count,
};

const DEFAULT_CONFIG_FILE: &str = "linkref.json";
const USAGE: &str = "Usage: linkref [--reverse] [--no-titles] [--list] [--config <PATH>] \
                     [--links-from <PATH>] [--output <PATH>] [--references <PATH>] <INPUT>";

#[derive(Debug)]
struct Options {
    input: PathBuf,
    config: PathBuf,
    links_from: Option<PathBuf>,
    output: Option<PathBuf>,
    references: Option<PathBuf>,
    reverse: bool,
    fetch_titles: bool,
    list_only: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut input = None;
    let mut options = Options {
        input: PathBuf::new(),
        config: PathBuf::from(DEFAULT_CONFIG_FILE),
        links_from: None,
        output: None,
        references: None,
        reverse: false,
        fetch_titles: true,
        list_only: false,
    };

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .map(PathBuf::from)
                .with_context(|| format!("{name} expects a path\n{USAGE}"))
        };

        match arg.as_str() {
            "--reverse" => options.reverse = true,
            "--no-titles" => options.fetch_titles = false,
            "--list" => options.list_only = true,
            "--config" => options.config = value("--config")?,
            "--links-from" => options.links_from = Some(value("--links-from")?),
            "--output" => options.output = Some(value("--output")?),
            "--references" => options.references = Some(value("--references")?),
            flag if flag.starts_with("--") => bail!("Unknown option {flag}\n{USAGE}"),
            path => {
                if input.replace(PathBuf::from(path)).is_some() {
                    bail!("Only one input file can be processed at a time\n{USAGE}");
                }
            }
        }
    }

    options.input = input.context(USAGE)?;
    Ok(options)
}

/// Writes `content` followed by a line break unless it already ends with one.
fn print_content(out: &mut impl Write, content: &str) -> io::Result<()> {
    out.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

fn write_or_print(target: Option<&PathBuf>, content: &str) -> Result<()> {
    match target {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => print_content(&mut io::stdout().lock(), content)
            .context("Failed to write to stdout"),
    }
}

async fn run(options: Options, log: SharedLog) -> Result<()> {
    let mut config = AppConfig::load_or_default(&options.config, log.as_ref());
    if let Err(e) = config.validate() {
        log.warning(&format!("Configuration problem: {e}"));
    }

    let input_display = options.input.display().to_string();
    let text = fs::read_to_string(&options.input)
        .with_context(|| format!("Failed to read {input_display}"))?;
    info!("Loaded {input_display} ({} bytes)", text.len());

    config.remember_file(&input_display);
    if let Err(e) = config.save() {
        log.warning(&format!("Failed to update recent files: {e}"));
    }

    let link_source = match &options.links_from {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => text.clone(),
    };

    let extractor = LinkExtractor::new(log.clone());
    let mut links = extractor.extract(&link_source, &config.extraction);

    if options.list_only {
        for link in &links {
            println!("{}", link.display_text());
        }
        return Ok(());
    }

    if selected_count(&links) == 0 {
        log.warning(&format!("No links found in {input_display}"));
        return write_or_print(options.output.as_ref(), &text);
    }

    let transformer = TextTransformer::new(
        config.templates.clone(),
        &config.title_rules,
        log.clone(),
    );

    if options.reverse {
        let result = transformer.process_reverse(&text, &links)?;
        write_or_print(options.output.as_ref(), &result.processed_text)?;
    } else {
        if options.fetch_titles {
            let fetcher = Arc::new(HttpTitleFetcher::new(log.clone())?);
            let summary = TitleResolver::new(fetcher, log.clone())
                .resolve(&mut links)
                .await;
            info!(
                "Titles resolved: {}/{} ({} failed)",
                summary.resolved, summary.requested, summary.failed
            );
        }

        let result = transformer.process(&text, &mut links)?;
        write_or_print(options.output.as_ref(), &result.processed_text)?;
        if let Some(reference_list) = result.reference_list {
            write_or_print(options.references.as_ref(), &reference_list)?;
        }
    }

    log.info(&format!(
        "Processing finished. Links processed: {}",
        selected_count(&links)
    ));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    WriteLogger::init(
        LevelFilter::Debug,
        simplelog::ConfigBuilder::new()
            .set_max_level(LevelFilter::Debug)
            .add_filter_ignore_str("hyper")
            .add_filter_ignore_str("reqwest")
            .build(),
        File::create("linkref.log")?,
    )?;

    let options = parse_args(env::args().skip(1))?;
    info!("Starting linkref for {}", options.input.display());

    let log = Arc::new(MemoryLog::new().forwarding());
    let result = run(options, log.clone()).await;
    if let Err(err) = &result {
        error!("Processing failed: {err:?}");
    }

    let warnings = log.messages_at(LogLevel::Warning).len();
    let errors = log.messages_at(LogLevel::Error).len();
    if warnings + errors > 0 {
        eprintln!("linkref: {warnings} warning(s), {errors} error(s); see linkref.log");
    }

    info!("Shutting down linkref");
    result
}
