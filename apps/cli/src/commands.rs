//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use deepresearch_core::{ProgressReporter, ResearchPipeline, Step, validate_query};
use deepresearch_shared::{AppConfig, DeepResearchError, PipelineState, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::render::render_report;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DeepResearch: web-researched answers to natural-language questions.
#[derive(Parser)]
#[command(
    name = "deepresearch",
    version,
    about = "Search the web, summarize sources, and draft a refined answer to a question.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Research a query and print the final answer with its sources.
    Ask {
        /// The question to research.
        query: String,

        /// Maximum number of search results to summarize.
        #[arg(long)]
        max_results: Option<usize>,

        /// Completion model override.
        #[arg(long)]
        model: Option<String>,

        /// Print the full pipeline state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Launch the interactive TUI.
    Tui,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout
/// carries only the answer.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "deepresearch=warn",
        1 => "deepresearch=info",
        2 => "deepresearch=debug",
        _ => "deepresearch=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask {
            query,
            max_results,
            model,
            json,
        } => cmd_ask(&query, max_results, model, json).await,
        Command::Tui => cmd_tui(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

async fn cmd_ask(
    query: &str,
    max_results: Option<usize>,
    model: Option<String>,
    json: bool,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(n) = max_results {
        config.retrieval.max_results = n;
    }
    if let Some(model) = model {
        config.completion.model = model;
    }

    let pipeline = ResearchPipeline::from_config(&config)?;

    info!(
        model = %config.completion.model,
        max_results = pipeline.max_results(),
        "researching query"
    );

    if let Err(e) = validate_query(query) {
        eprintln!("warning: {}", validation_message(&e));
        return Ok(());
    }

    let reporter = CliProgress::new();
    let outcome = pipeline.run(query, &reporter).await;
    reporter.clear();
    let state = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render_report(&state));
    }

    Ok(())
}

/// The bare message of a validation error, without the category prefix.
fn validation_message(err: &DeepResearchError) -> &str {
    match err {
        DeepResearchError::Validation { message } => message,
        _ => "invalid input",
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        spinner.set_message("Researching... This may take a moment.");
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn step_started(&self, step: Step) {
        let msg = match step {
            Step::Research => "Searching the web",
            Step::Draft => "Drafting an answer",
            Step::Refine => "Refining the answer",
        };
        self.spinner.set_message(msg);
    }

    fn source_summarized(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Summarized [{current}/{total}] {url}"));
    }

    fn done(&self, _state: &PipelineState) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// tui / config
// ---------------------------------------------------------------------------

/// Hand over to the `deepresearch-tui` binary, looked up next to this
/// executable first and then on `PATH`.
fn cmd_tui() -> Result<()> {
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("deepresearch-tui")))
        .filter(|path| path.exists());

    let program = sibling
        .map(|p| p.into_os_string())
        .unwrap_or_else(|| "deepresearch-tui".into());

    info!(?program, "launching TUI");

    let status = std::process::Command::new(&program)
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status()
        .map_err(|e| eyre!("failed to launch deepresearch-tui: {e}"))?;

    if !status.success() {
        return Err(eyre!(
            "deepresearch-tui exited with status: {}",
            status.code().unwrap_or(-1)
        ));
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_parses_overrides() {
        let cli = Cli::try_parse_from([
            "deepresearch",
            "ask",
            "latest AI in healthcare",
            "--max-results",
            "3",
            "--json",
        ])
        .expect("parse");

        match cli.command {
            Command::Ask {
                query,
                max_results,
                model,
                json,
            } => {
                assert_eq!(query, "latest AI in healthcare");
                assert_eq!(max_results, Some(3));
                assert!(model.is_none());
                assert!(json);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn verbosity_is_global() {
        let cli = Cli::try_parse_from(["deepresearch", "config", "show", "-vv"]).expect("parse");
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn validation_message_strips_prefix() {
        let err = DeepResearchError::validation("Please enter a query.");
        assert_eq!(validation_message(&err), "Please enter a query.");
    }
}
