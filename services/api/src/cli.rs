use crate::maintenance::{run_expire_jobs, run_export_profile, ExpireJobsArgs, ExportProfileArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use placement_portal::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Placement Portal",
    about = "Run the campus placement portal and its maintenance tasks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Close open postings whose interview date has passed
    ExpireJobs(ExpireJobsArgs),
    /// Write a student's profile document to disk
    ExportProfile(ExportProfileArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::ExpireJobs(args) => run_expire_jobs(args).await,
        Command::ExportProfile(args) => run_export_profile(args).await,
    }
}
