use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::{document::Contributor, search::DEFAULT_SEARCH_LIMIT};

#[derive(Debug, Parser)]
#[command(
    name = "pipeline-kb",
    about = "Ask questions about the emissions pipeline documentation"
)]
pub struct Cli {
    /// Override the knowledge base directory
    #[arg(long, global = true)]
    pub kb_dir: Option<PathBuf>,

    /// Override the generation model
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rank knowledge base documents against a query
    Search(SearchArgs),
    /// Answer a question from the knowledge base
    Ask(AskArgs),
    /// List loaded documents
    Docs(DocsArgs),
    /// Print a single document by id
    Get(GetArgs),
    /// Show what was loaded and what was skipped
    Status(StatusArgs),
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question
    pub question: String,

    /// Entity currently being looked at
    #[arg(long)]
    pub entity_id: Option<String>,

    /// Chart currently being looked at
    #[arg(long)]
    pub chart_type: Option<String>,

    /// Output the full answer object as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Docs --

#[derive(Debug, Parser)]
pub struct DocsArgs {
    /// Glob pattern applied to source file names
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Only documents from this contributor (maria or victoria)
    #[arg(short, long)]
    pub contributor: Option<Contributor>,

    /// Output as JSON array
    #[arg(long)]
    pub json: bool,
}

// -- Get --

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Document id
    pub id: u32,

    /// Output as JSON with metadata
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "pipeline-kb",
            &mut std::io::stdout(),
        );
    }
}
