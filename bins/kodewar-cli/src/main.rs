mod commands;

use clap::{Parser, Subcommand};
use anyhow::Result;

#[derive(Parser)]
#[command(name = "kodewar-cli")]
#[command(about = "Kodewar CLI - Submit code and inspect execution results", long_about = None)]
struct Cli {
    /// Redis connection URL
    #[arg(long, global = true, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a source file for execution
    Submit {
        /// Path to the source file
        #[arg(short, long)]
        file: String,

        /// Language to execute with (e.g., python, javascript)
        #[arg(short, long)]
        language: String,

        /// Path to a JSON file of test cases: [{"input": "...", "expected": "..."}]
        #[arg(short, long)]
        tests: Option<String>,

        /// Execution deadline in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Memory ceiling in MB
        #[arg(long, default_value = "512")]
        memory_limit: u64,

        /// Wait for the result and print it
        #[arg(long, default_value = "false")]
        follow: bool,
    },

    /// Fetch the stored result for a submission
    Status {
        /// Submission id returned by submit
        submission_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            file,
            language,
            tests,
            timeout,
            memory_limit,
            follow,
        } => {
            commands::submit(
                &cli.redis_url,
                &file,
                &language,
                tests.as_deref(),
                timeout,
                memory_limit,
                follow,
            )
            .await?;
        }
        Commands::Status { submission_id } => {
            commands::status(&cli.redis_url, &submission_id).await?;
        }
    }

    Ok(())
}
