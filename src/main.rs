use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use propsync::adapters::LogSink;
use propsync::ports::NoopSink;
use propsync::{AppError, Channel, Proposal, SyncConfig};

#[derive(Parser)]
#[command(name = "propsync")]
#[command(version)]
#[command(about = "Track voting portal proposals and report their changes", long_about = None)]
struct Cli {
    /// Path to propsync.toml (defaults to ./propsync.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the portal forever, logging every event
    Run,
    /// Run a single reconciliation cycle and print its report
    Sync,
    /// List stored proposals
    #[clap(visible_alias = "ls")]
    List {
        /// Which proposals to show
        #[arg(short, long, value_enum, default_value_t = ListFilter::All)]
        filter: ListFilter,
        /// Only open proposals closing within this many seconds (applies to every filter)
        #[arg(long)]
        closing_within: Option<i64>,
        /// Only proposals not yet broadcast on one of these channels
        #[arg(long, value_parser = parse_channel, num_args = 1..)]
        unpublished: Vec<Channel>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFilter {
    All,
    Open,
    Passing,
    Failing,
    Latest,
}

fn parse_channel(value: &str) -> Result<Channel, String> {
    value.parse::<Channel>().map_err(|e| e.to_string())
}

fn main() {
    let cli = Cli::parse();

    let result = propsync::load_config(cli.config.as_deref()).and_then(|config| {
        init_logging(&config);
        match cli.command {
            Commands::Run => run(&config),
            Commands::Sync => sync(&config),
            Commands::List { filter, closing_within, unpublished } => {
                list(&config, filter, closing_within, &unpublished)
            }
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &SyncConfig) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env).format_timestamp_secs().init();
}

fn run(config: &SyncConfig) -> Result<(), AppError> {
    let handle = propsync::start(config, Arc::new(LogSink))?;
    handle.wait()?;
    Ok(())
}

fn sync(config: &SyncConfig) -> Result<(), AppError> {
    let mut reconciler = propsync::connect(config, Arc::new(LogSink))?;
    let report = reconciler.run_cycle()?;
    println!("{}", report);
    Ok(())
}

fn list(
    config: &SyncConfig,
    filter: ListFilter,
    closing_within: Option<i64>,
    unpublished: &[Channel],
) -> Result<(), AppError> {
    let book = propsync::connect(config, Arc::new(NoopSink))?.book();

    let mut proposals = match filter {
        ListFilter::All => book.get_all_proposals(),
        ListFilter::Open => book.get_open_proposals(None),
        ListFilter::Passing => book.get_passing_proposals(),
        ListFilter::Failing => book.get_failing_proposals(),
        ListFilter::Latest => book.get_latest_proposal().into_iter().collect(),
    };

    if let Some(limit) = closing_within {
        let now = Utc::now();
        proposals.retain(|p| p.is_open() && p.remaining_seconds_at(now) < limit);
    }

    if !unpublished.is_empty() {
        let pending: Vec<u64> =
            book.get_unpublished_proposals(unpublished).iter().map(|p| p.proposal_id).collect();
        proposals.retain(|p| pending.contains(&p.proposal_id));
    }

    if proposals.is_empty() {
        println!("No proposals found.");
    }
    for proposal in &proposals {
        println!("{}", summary_line(proposal));
    }
    Ok(())
}

fn summary_line(p: &Proposal) -> String {
    format!(
        "#{} {} [{}] yes {}% no {}% abstain {}% | {}",
        p.proposal_id,
        p.title,
        p.status,
        p.percent_yes_display(),
        p.percent_no_display(),
        p.percent_abstain_display(),
        if p.is_open() { p.remaining_text() } else { p.deadline_display() }
    )
}
