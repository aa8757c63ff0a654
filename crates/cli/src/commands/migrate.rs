use dealsense_db::migrations;

use crate::commands::{execute, CommandResult};

pub fn run() -> CommandResult {
    execute("migrate", |pool, _config| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        Ok("applied pending migrations".to_owned())
    })
}
