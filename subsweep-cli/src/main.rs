use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use subsweep::{
    config::ScannerOptions,
    dns::RecordType,
    scanner::{JsonFormatter, LogFormatter, PlainFormatter, ScanEvent, Scanner},
    utils::{candidate_names, clean_lines, parse_resolvers},
};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `name (IP = a.b.c.d)` lines
    Plain,
    /// One JSON object per record
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "subsweep")]
#[command(version)]
#[command(about = "Fast DNS subdomain discovery over a pool of resolvers")]
struct Cli {
    /// Wordlist file, one word per line (repeatable)
    #[arg(short = 'w', long = "wordlist", value_name = "FILE", required = true)]
    wordlists: Vec<PathBuf>,

    /// Resolver list file, one IPv4 address[:port] per line (repeatable)
    #[arg(short = 'r', long = "resolvers", value_name = "FILE", required = true)]
    resolvers: Vec<PathBuf>,

    /// Base domain to build candidates under (repeatable)
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN", required = true)]
    domains: Vec<String>,

    /// Record type to query: A, NS, CNAME, SOA, PTR, MX, TXT, AAAA, AXFR, ANY (repeatable, default A)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    types: Vec<RecordType>,

    /// Seconds to wait for a reply before sending a query again (default 0.5)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<f64>,

    /// Maximum queries sent per second (default 2000)
    #[arg(long)]
    qps: Option<u32>,

    /// Do not print progress and the final statistics
    #[arg(long)]
    no_print_stats: bool,

    /// Give up on a query after this many unanswered sends (default: never)
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Output format for discovered records
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    format: OutputFormat,

    /// TOML file with scanner options; flags take precedence
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let options = load_options(&cli)?;

    let words = read_lists(&cli.wordlists).context("could not load the wordlist")?;
    let resolver_entries = read_lists(&cli.resolvers).context("could not load the resolver list")?;
    let domains = clean_lines(&cli.domains.join("\n"));

    let names = candidate_names(&words, &domains)?;
    let resolvers = parse_resolvers(&resolver_entries)?;
    info!(
        candidates = names.len(),
        resolvers = resolvers.len(),
        "inputs loaded"
    );

    match cli.format {
        OutputFormat::Plain => scan::<PlainFormatter>(names, resolvers, options).await,
        OutputFormat::Json => scan::<JsonFormatter>(names, resolvers, options).await,
    }
}

async fn scan<F>(
    names: Vec<String>,
    resolvers: Vec<std::net::SocketAddrV4>,
    options: ScannerOptions,
) -> anyhow::Result<()>
where
    F: LogFormatter<Output = String> + Default,
{
    let print_stats = options.print_stats;
    let scanner = Scanner::<F>::new(names, resolvers)
        .with_options(options)
        .build()
        .await?;

    if print_stats {
        println!("starting...");
    }

    let (mut events, handle) = scanner.spawn();
    while let Some(event) = events.next().await {
        match event {
            ScanEvent::Record(line) => println!("{line}"),
            ScanEvent::Progress(progress) => println!("{progress}"),
            ScanEvent::Unanswered {
                domain,
                record_type,
                attempts,
            } => warn!(%domain, %record_type, attempts, "no answer"),
        }
    }

    let summary = handle.await.context("scan task failed")?;
    if print_stats {
        println!("\n");
        println!("{summary}\n");
    }
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Defaults, then the config file, then flags.
fn load_options(cli: &Cli) -> anyhow::Result<ScannerOptions> {
    let mut options = match &cli.config {
        Some(path) => options_from_file(path)?,
        None => ScannerOptions::default(),
    };
    apply_overrides(&mut options, cli);
    options.validate()?;
    Ok(options)
}

fn options_from_file(path: &Path) -> anyhow::Result<ScannerOptions> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

fn apply_overrides(options: &mut ScannerOptions, cli: &Cli) {
    if !cli.types.is_empty() {
        options.record_types = cli.types.clone();
    }
    if let Some(timeout) = cli.timeout {
        options.timeout_secs = timeout;
    }
    if let Some(qps) = cli.qps {
        options.qps = qps;
    }
    if let Some(max) = cli.max_attempts {
        options.max_attempts = Some(max);
    }
    if cli.no_print_stats {
        options.print_stats = false;
    }
}

/// Reads every file and merges their cleaned lines.
fn read_lists(paths: &[PathBuf]) -> anyhow::Result<Vec<String>> {
    let mut merged = String::new();
    for path in paths {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not open {} for reading", path.display()))?;
        merged.push_str(&content);
        merged.push('\n');
    }
    Ok(clean_lines(&merged))
}
