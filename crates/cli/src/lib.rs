pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "dealsense",
    about = "DealSense operator CLI",
    long_about = "Operate the deal intelligence engine: migrations, demo fixtures, \
                  scoring reads, and the batch sweeps.",
    after_help = "Examples:\n  dealsense migrate\n  dealsense seed\n  dealsense score buyer-rose-city prod-flower-premium\n  dealsense regenerate"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the deterministic demo marketplace dataset")]
    Seed,
    #[command(about = "Score one buyer-product pair without persisting anything")]
    Score {
        #[arg(help = "Buyer id")]
        buyer_id: String,
        #[arg(help = "Product id")]
        product_id: String,
    },
    #[command(about = "Regenerate matches for every active product")]
    Regenerate,
    #[command(about = "Run the reorder prediction sweep, or one buyer with --buyer")]
    Predict {
        #[arg(long, help = "Restrict the sweep to one buyer id")]
        buyer: Option<String>,
    },
    #[command(about = "Detect churn signals and print the dashboard counts")]
    Churn,
    #[command(about = "Recalculate reliability scores for every seller")]
    Sellers,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Score { buyer_id, product_id } => commands::score::run(buyer_id, product_id),
        Command::Regenerate => commands::batch::regenerate(),
        Command::Predict { buyer } => commands::batch::predict(buyer),
        Command::Churn => commands::batch::churn(),
        Command::Sellers => commands::batch::sellers(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
