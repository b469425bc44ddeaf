//! # dspy-archive CLI
//!
//! Command-line front end for the archive pipeline and the module chat.
//!
//! - `search`: query code search and save the file list as JSON
//! - `extract`: download listed files and pull out module classes
//! - `tabulate`: flatten extracted modules into a CSV table
//! - `run`: search, extract and tabulate in one pass
//! - `chat`: terminal chat against a hosted module-generation endpoint
//! - `notebook`: wrap a module class in a deployment notebook

mod telemetry;
mod tui;

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use dspy_archive::archive;
use dspy_archive::chat::{ChatConfig, HistoryMode, InferenceClient};
use dspy_archive::extract::{DEFAULT_BASE_CLASS, ModulePattern};
use dspy_archive::github::{DEFAULT_QUERY, GithubClient, GithubConfig};
use dspy_archive::notebook::{make_notebook, make_notebook_for_module};
use dspy_archive::secrets::{DEFAULT_SECRETS_PATH, Secrets};
use telemetry::OtelGuard;
use tracing::{info, instrument};

const DEFAULT_SEARCH_OUTPUT: &str = "script_archive/dspy_code_snippets.json";
const DEFAULT_MODULES_OUTPUT: &str = "script_archive/dspy_modules.json";
const DEFAULT_CSV_OUTPUT: &str = "script_archive/dspy_modules.csv";
const DEFAULT_NOTEBOOK_DIR: &str = "notebooks";

#[derive(Parser)]
#[command(author, version, about = "Archive dspy.Module classes from public code and chat with a module generator", long_about = None)]
struct Cli {
    /// Secrets file holding API tokens
    #[arg(long, global = true, default_value = DEFAULT_SECRETS_PATH)]
    secrets: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search public code and save the matching files as JSON
    Search(SearchArgs),

    /// Extract module classes from a saved search
    Extract(ExtractArgs),

    /// Turn extracted modules into a CSV table
    Tabulate(TabulateArgs),

    /// Search, extract and tabulate in one go
    Run(RunArgs),

    /// Chat with a hosted module-generation endpoint
    Chat(ChatArgs),

    /// Package a module class as a deployment notebook
    Notebook(NotebookArgs),
}

#[derive(Args, Debug)]
struct SearchOptions {
    /// Code search query
    #[arg(short, long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Results per page
    #[arg(long, default_value = "100")]
    per_page: u32,

    /// Maximum number of pages to fetch
    #[arg(short = 'p', long, default_value = "10")]
    max_pages: u32,

    /// Code search API base URL
    #[arg(long, default_value = dspy_archive::github::DEFAULT_API_BASE_URL)]
    api_url: String,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[command(flatten)]
    search: SearchOptions,

    /// Output JSON file
    #[arg(short, long, default_value = DEFAULT_SEARCH_OUTPUT)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Saved search results
    #[arg(short, long, default_value = DEFAULT_SEARCH_OUTPUT)]
    input: PathBuf,

    /// Output JSON file
    #[arg(short, long, default_value = DEFAULT_MODULES_OUTPUT)]
    output: PathBuf,

    /// Base class a module must inherit from
    #[arg(short, long, default_value = DEFAULT_BASE_CLASS)]
    base_class: String,

    /// Code search API base URL
    #[arg(long, default_value = dspy_archive::github::DEFAULT_API_BASE_URL)]
    api_url: String,
}

#[derive(Args, Debug)]
struct TabulateArgs {
    /// Extracted modules JSON file
    #[arg(short, long, default_value = DEFAULT_MODULES_OUTPUT)]
    input: PathBuf,

    /// Output CSV file
    #[arg(short, long, default_value = DEFAULT_CSV_OUTPUT)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    search: SearchOptions,

    /// Output CSV file
    #[arg(short, long, default_value = DEFAULT_CSV_OUTPUT)]
    output: PathBuf,

    /// Base class a module must inherit from
    #[arg(short, long, default_value = DEFAULT_BASE_CLASS)]
    base_class: String,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Serving endpoint base URL
    #[arg(short, long, env = "DB_ENDPOINT_URL")]
    endpoint: String,

    /// Served model name
    #[arg(short, long, default_value = dspy_archive::chat::DEFAULT_MODEL)]
    model: String,

    /// Maximum tokens per reply
    #[arg(long, default_value = "256")]
    max_tokens: u32,

    /// What part of the conversation is sent with each request
    #[arg(long, value_enum, default_value_t = HistoryMode::LatestTurn)]
    history: HistoryMode,

    /// Where Ctrl+S saves notebooks
    #[arg(short, long, default_value = DEFAULT_NOTEBOOK_DIR)]
    notebook_dir: PathBuf,
}

#[derive(Args, Debug)]
struct NotebookArgs {
    /// File holding the module class definition
    #[arg(required = true)]
    class_file: PathBuf,

    /// Example input for the module
    #[arg(short, long, default_value = "")]
    message: String,

    /// Class name, read from the definition when omitted
    #[arg(short, long)]
    class_name: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = DEFAULT_NOTEBOOK_DIR)]
    save_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut _otel: Option<OtelGuard> = None;
    if matches!(cli.command, Some(Commands::Chat(_))) {
        tui::logging::setup_logging(cli.verbose)?;
    } else {
        _otel = Some(telemetry::init_tracing_subscriber(cli.verbose)?);
    }

    match cli.command {
        Some(Commands::Search(args)) => search_command(&cli.secrets, args).await?,
        Some(Commands::Extract(args)) => extract_command(&cli.secrets, args).await?,
        Some(Commands::Tabulate(args)) => tabulate_command(args)?,
        Some(Commands::Run(args)) => run_command(&cli.secrets, args).await?,
        Some(Commands::Chat(args)) => chat_command(&cli.secrets, args).await?,
        Some(Commands::Notebook(args)) => notebook_command(args)?,
        None => {
            let _ = Cli::parse_from(["dspy-archive", "--help"]);
        }
    }

    Ok(())
}

fn github_client(secrets_path: &Path, options: Option<&SearchOptions>, api_url: &str) -> anyhow::Result<GithubClient> {
    let token = Secrets::load_or_default(secrets_path)?.github_token()?;
    let mut builder = GithubConfig::builder().token(token).api_base_url(api_url);
    if let Some(options) = options {
        builder = builder.per_page(options.per_page).max_pages(options.max_pages);
    }
    Ok(GithubClient::new(builder.build())?)
}

#[instrument(skip(secrets_path))]
async fn search_command(secrets_path: &Path, args: SearchArgs) -> anyhow::Result<()> {
    let client = github_client(secrets_path, Some(&args.search), &args.search.api_url)?;
    let path = archive::save_search_results(&client, &args.search.query, &args.output).await?;
    println!("Saved search results to {}", path.display());
    Ok(())
}

#[instrument(skip(secrets_path))]
async fn extract_command(secrets_path: &Path, args: ExtractArgs) -> anyhow::Result<()> {
    let client = github_client(secrets_path, None, &args.api_url)?;
    let pattern = ModulePattern::new(&args.base_class)?;
    let path = archive::extract_modules_from_file(&client, &args.input, &args.output, &pattern).await?;
    println!("Saved extracted modules to {}", path.display());
    Ok(())
}

#[instrument]
fn tabulate_command(args: TabulateArgs) -> anyhow::Result<()> {
    let path = archive::tabulate_file(&args.input, &args.output)?;
    println!("Saved module table to {}", path.display());
    Ok(())
}

#[instrument(skip(secrets_path))]
async fn run_command(secrets_path: &Path, args: RunArgs) -> anyhow::Result<()> {
    let client = github_client(secrets_path, Some(&args.search), &args.search.api_url)?;
    let pattern = ModulePattern::new(&args.base_class)?;
    let path = archive::run(&client, &args.search.query, &args.output, &pattern).await?;
    println!("Saved module table to {}", path.display());
    Ok(())
}

async fn chat_command(secrets_path: &Path, args: ChatArgs) -> anyhow::Result<()> {
    let token = Secrets::load_or_default(secrets_path)?.db_token()?;
    let config = ChatConfig::builder()
        .base_url(args.endpoint)
        .token(token)
        .model(args.model)
        .max_tokens(args.max_tokens)
        .history_mode(args.history)
        .build()?;
    info!("Chatting with {}", config.completions_url());

    tui::run(InferenceClient::new(config)?, args.notebook_dir).await
}

#[instrument]
fn notebook_command(args: NotebookArgs) -> anyhow::Result<()> {
    let class_def = std::fs::read_to_string(&args.class_file)
        .with_context(|| format!("reading {}", args.class_file.display()))?;
    if class_def.trim().is_empty() {
        return Err(anyhow!("{} is empty", args.class_file.display()));
    }

    let path = match args.class_name {
        Some(name) => make_notebook(&args.message, &class_def, &name, &args.save_dir)?,
        None => make_notebook_for_module(&args.message, &class_def, &args.save_dir)?,
    };
    println!("Saved notebook to {}", path.display());
    Ok(())
}
