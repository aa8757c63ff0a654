use std::sync::Arc;

use dealsense_core::domain::product::ProductId;
use dealsense_core::domain::user::UserId;
use dealsense_engine::{Intelligence, NullNotifier};

use crate::commands::{execute, CommandResult};

pub fn run(buyer_id: String, product_id: String) -> CommandResult {
    execute("score", |pool, config| async move {
        let engine = Intelligence::new(pool, &config, Arc::new(NullNotifier));

        let scored = engine
            .matching
            .score_match(&UserId(buyer_id), &ProductId(product_id))
            .await
            .map_err(|error| ("scoring", error.to_string(), 6u8))?;

        let insights: Vec<String> = scored
            .insights
            .iter()
            .map(|insight| format!("[{:?}] {}", insight.tag, insight.message))
            .collect();

        Ok(format!("score {:.1}; insights: {}", scored.score, insights.join(" | ")))
    })
}
