use dealsense_core::chrono::Utc;
use dealsense_db::{migrations, seed_demo_dataset};

use crate::commands::{execute, CommandResult};

pub fn run() -> CommandResult {
    execute("seed", |pool, _config| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let summary = seed_demo_dataset(&pool, Utc::now())
            .await
            .map_err(|error| ("seed", error.to_string(), 6u8))?;

        Ok(format!(
            "seeded demo marketplace: {} users, {} products, {} transactions, {} bids",
            summary.users, summary.products, summary.transactions, summary.bids
        ))
    })
}
