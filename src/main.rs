use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "tfharden")]
#[command(about = "Gathers a Terraform example with its local modules, asks a language model to harden it, and reconciles the rewrite", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Perform a dry run without calling the model or writing files")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List the examples of a Terraform repository")]
    Examples {
        #[arg(help = "Repository root")]
        repo: PathBuf,
    },

    #[command(about = "Show the files an example depends on")]
    Analyze {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long, help = "Print the closure as JSON")]
        json: bool,
    },

    #[command(about = "Ask the language model for a security rewrite of an example")]
    Enhance {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long, help = "Instruction sent with the files (defaults to the template's)")]
        prompt: Option<String>,

        #[arg(long, help = "Prompt template name (defaults to enhance_security)")]
        template: Option<String>,

        #[arg(long, help = "Directory holding prompt templates and model_registry.yml")]
        prompts_dir: Option<PathBuf>,

        #[arg(long, help = "Write the updated files back over the originals")]
        apply: bool,

        #[arg(long, help = "Save the raw model reply into this directory")]
        save_response: Option<PathBuf>,
    },

    #[command(about = "Reconcile a saved model reply with an example")]
    Reconcile {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(help = "File holding the model reply")]
        reply: PathBuf,

        #[arg(long, help = "Write the updated files back over the originals")]
        apply: bool,
    },

    #[command(about = "Clone a Terraform repository")]
    Clone {
        #[arg(help = "Repository URL")]
        url: String,

        #[arg(long, help = "Target directory (defaults to <tmp>/terraform_repo)")]
        into: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct TargetArgs {
    #[arg(help = "Repository root")]
    repo: PathBuf,

    #[arg(help = "Example directory relative to the repository root, e.g. examples/basic")]
    example: PathBuf,

    #[arg(long, help = "Also follow module references found inside expanded modules")]
    transitive: bool,
}

impl From<TargetArgs> for cli::Target {
    fn from(args: TargetArgs) -> Self {
        cli::Target {
            repo: args.repo,
            example: args.example,
            transitive: args.transitive,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tfharden=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Examples { repo } => {
            cli::list_examples(&repo)?;
        }
        Commands::Analyze { target, json } => {
            cli::analyze(target.into(), json, &config)?;
        }
        Commands::Enhance {
            target,
            prompt,
            template,
            prompts_dir,
            apply,
            save_response,
        } => {
            let options = cli::EnhanceOptions {
                prompt,
                template,
                prompts_dir,
                apply,
                save_response,
            };
            cli::enhance(target.into(), options, &config).await?;
        }
        Commands::Reconcile { target, reply, apply } => {
            cli::reconcile(target.into(), &reply, apply, &config)?;
        }
        Commands::Clone { url, into } => {
            cli::clone(&url, into, &config)?;
        }
    }

    Ok(())
}
