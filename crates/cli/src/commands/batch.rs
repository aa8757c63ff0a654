//! The operator-facing batch sweeps: matches, predictions, churn, sellers.

use std::sync::Arc;

use dealsense_core::domain::user::UserId;
use dealsense_engine::{Intelligence, Notifier, NullNotifier, WebhookNotifier};

use crate::commands::{execute, CommandResult};

fn notifier_from_config(config: &dealsense_core::config::AppConfig) -> Arc<dyn Notifier> {
    match &config.intelligence.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NullNotifier),
    }
}

pub fn regenerate() -> CommandResult {
    execute("regenerate", |pool, config| async move {
        let notifier = notifier_from_config(&config);
        let engine = Intelligence::new(pool, &config, notifier);

        let sweep = engine
            .matching
            .regenerate_all_matches()
            .await
            .map_err(|error| ("match_regeneration", error.to_string(), 6u8))?;

        Ok(format!(
            "processed {} products ({} failed), created {} matches",
            sweep.products_processed, sweep.products_failed, sweep.matches_created
        ))
    })
}

pub fn predict(buyer: Option<String>) -> CommandResult {
    execute("predict", |pool, config| async move {
        let notifier = notifier_from_config(&config);
        let engine = Intelligence::new(pool, &config, notifier);

        match buyer {
            Some(buyer_id) => {
                let created = engine
                    .reorder
                    .generate_predictions_for_buyer(&UserId(buyer_id))
                    .await
                    .map_err(|error| ("prediction", error.to_string(), 6u8))?;
                Ok(format!("created {created} predictions"))
            }
            None => {
                let sweep = engine
                    .reorder
                    .generate_predictions()
                    .await
                    .map_err(|error| ("prediction_sweep", error.to_string(), 6u8))?;
                Ok(format!(
                    "processed {} buyers, created {} predictions, removed {}, notified {}",
                    sweep.buyers_processed,
                    sweep.predictions_created,
                    sweep.predictions_removed,
                    sweep.notifications_sent
                ))
            }
        }
    })
}

pub fn churn() -> CommandResult {
    execute("churn", |pool, config| async move {
        let engine = Intelligence::new(pool, &config, Arc::new(NullNotifier));

        let sweep = engine
            .churn
            .detect_all_churn_signals()
            .await
            .map_err(|error| ("churn_detection", error.to_string(), 6u8))?;
        let stats = engine
            .churn
            .get_churn_stats()
            .await
            .map_err(|error| ("churn_stats", error.to_string(), 6u8))?;

        Ok(format!(
            "raised {}, resolved {}; active now: {} critical / {} high / {} medium / {} low",
            sweep.signals_raised,
            sweep.signals_resolved,
            stats.critical,
            stats.high,
            stats.medium,
            stats.low
        ))
    })
}

pub fn sellers() -> CommandResult {
    execute("sellers", |pool, config| async move {
        let engine = Intelligence::new(pool, &config, Arc::new(NullNotifier));

        let sweep = engine
            .sellers
            .recalculate_all_seller_scores()
            .await
            .map_err(|error| ("seller_scoring", error.to_string(), 6u8))?;

        Ok(format!(
            "updated {} sellers ({} failed)",
            sweep.sellers_updated, sweep.sellers_failed
        ))
    })
}
