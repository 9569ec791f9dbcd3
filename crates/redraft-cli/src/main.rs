#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "redraft: fork a published document, revise it privately, merge it back",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a redraft project",
        long_about = "Create .redraft/ with a default config and an empty document database.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    rd init\n\n    # Rewrite the default config, keeping documents\n    rd init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Documents",
        about = "Create a document",
        long_about = "Create a document with fields, metadata rows and term assignments. The status defaults to the configured published status.",
        after_help = "EXAMPLES:\n    # Create a published article\n    rd create --title \"Election night\" --body \"Polls close at eight.\"\n\n    # With metadata and terms\n    rd create --title \"Weather\" --meta views=10 --term category=news\n\n    # Emit machine-readable output\n    rd create --title \"Weather\" --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Documents",
        about = "Show one document",
        long_about = "Show a document's fields, metadata, terms and fork links.",
        after_help = "EXAMPLES:\n    # Show a document\n    rd show 42\n\n    # Emit machine-readable output\n    rd show 42 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Documents",
        about = "List documents",
        long_about = "List documents in id order, optionally filtered by status or to open forks.",
        after_help = "EXAMPLES:\n    # Everything\n    rd list\n\n    # Open forks awaiting work or review\n    rd list --forks\n\n    # Emit machine-readable output\n    rd list --status publish --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Documents",
        about = "Edit document fields",
        long_about = "Overwrite content fields of a document. Status and identity fields are managed by the workflow commands.",
        after_help = "EXAMPLES:\n    # Revise a fork\n    rd edit 43 --body \"Polls closed; counting begins.\"\n\n    # Set a custom field\n    rd edit 43 --field x_kicker=Live"
    )]
    Edit(cmd::edit::EditArgs),

    #[command(
        next_help_heading = "Documents",
        about = "Add or clear metadata rows",
        after_help = "EXAMPLES:\n    # Append a row\n    rd meta add 42 views 10\n\n    # Remove every row\n    rd meta clear 42"
    )]
    Meta(cmd::meta::MetaArgs),

    #[command(
        next_help_heading = "Documents",
        about = "Assign taxonomy terms",
        after_help = "EXAMPLES:\n    # Replace the tags\n    rd term set 42 post_tag sun heat\n\n    # Clear the categories\n    rd term set 42 category"
    )]
    Term(cmd::term::TermArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Fork a published document",
        long_about = "Create a private draft copy of a document, with its metadata and terms. A document has at most one open fork.",
        after_help = "EXAMPLES:\n    # Fork document 42\n    rd fork 42\n\n    # Emit machine-readable output\n    rd fork 42 --json"
    )]
    Fork(cmd::fork::ForkArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Submit a fork for review",
        long_about = "Move a draft fork to the pending-review status.",
        after_help = "EXAMPLES:\n    rd submit 43"
    )]
    Submit(cmd::submit::SubmitArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Publish a document",
        long_about = "Publish a document. Publishing an open fork merges it back into its original instead.",
        after_help = "EXAMPLES:\n    # Merge fork 43 into its original\n    rd publish 43\n\n    # Publish an ordinary draft in place\n    rd publish 12"
    )]
    Publish(cmd::publish::PublishArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Merge a fork into its original",
        long_about = "Copy a fork's fields, metadata and terms onto its original and retire the fork.",
        after_help = "EXAMPLES:\n    rd merge 43 --json"
    )]
    Merge(cmd::merge::MergeArgs),

    #[command(
        next_help_heading = "Workflow",
        about = "Show fork lifecycle state",
        long_about = "Report a document's lifecycle status, its fork links and whether it can be forked or merged.",
        after_help = "EXAMPLES:\n    rd status 42"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Endpoints",
        about = "Issue an endpoint request token",
        after_help = "EXAMPLES:\n    # Token for forking document 42\n    rd token fork 42"
    )]
    Token(cmd::token::TokenArgs),

    #[command(
        next_help_heading = "Endpoints",
        about = "Call the create-fork or merge-fork endpoint",
        long_about = "Verify a request token and run the endpoint, printing its {shouldRedirect, redirectUrl, message} response.",
        after_help = "EXAMPLES:\n    rd api fork 42 --token \"$(rd token fork 42)\""
    )]
    Api(cmd::api::ApiArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("REDRAFT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "redraft=debug,info"
        } else {
            "redraft=info,warn"
        })
    });

    let format = env::var("REDRAFT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        debug!("verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, output, &project_root),
        Commands::Create(args) => cmd::create::run_create(args, output, &project_root),
        Commands::Show(args) => cmd::show::run_show(args, output, &project_root),
        Commands::List(args) => cmd::list::run_list(args, output, &project_root),
        Commands::Edit(args) => cmd::edit::run_edit(args, output, &project_root),
        Commands::Meta(args) => cmd::meta::run_meta(args, output, &project_root),
        Commands::Term(args) => cmd::term::run_term(args, output, &project_root),
        Commands::Fork(args) => cmd::fork::run_fork(args, output, &project_root),
        Commands::Submit(args) => cmd::submit::run_submit(args, output, &project_root),
        Commands::Publish(args) => cmd::publish::run_publish(args, output, &project_root),
        Commands::Merge(args) => cmd::merge::run_merge(args, output, &project_root),
        Commands::Status(args) => cmd::status::run_status(args, output, &project_root),
        Commands::Token(args) => cmd::token::run_token(args, output, &project_root),
        Commands::Api(args) => cmd::api::run_api(args, output, &project_root),
    }
}
