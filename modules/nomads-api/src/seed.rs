//! Loading the bundled event list, on startup or from the `seed` command.

use anyhow::{Context, Result};
use tracing::{info, warn};

use nomads_common::{Config, SeedPolicy};
use nomads_store::{load_candidates, DocumentStore, DuplicatePolicy, EventSeeder, SeedError, SeedReport};

/// Run the seeder against the configured list.
pub async fn seed_from_config(
    store: &dyn DocumentStore,
    config: &Config,
    strict: bool,
) -> Result<SeedReport, SeedError> {
    let candidates = load_candidates(&config.seed_events_path)?;
    let policy = if strict || config.strict_seed_titles {
        DuplicatePolicy::Strict
    } else {
        DuplicatePolicy::AllowWithinBatch
    };
    EventSeeder::new(store)
        .with_policy(policy)
        .seed(&candidates)
        .await
}

/// Startup hook. Only `SeedPolicy::Abort` turns a seeding failure into a
/// startup failure.
pub async fn seed_on_startup(store: &dyn DocumentStore, config: &Config) -> Result<()> {
    match config.seed_on_startup {
        SeedPolicy::Skip => {
            info!("Startup seeding disabled");
            Ok(())
        }
        SeedPolicy::Warn => {
            if let Err(e) = seed_from_config(store, config, false).await {
                warn!(error = %e, "Failed to load events, continuing without them");
            }
            Ok(())
        }
        SeedPolicy::Abort => {
            seed_from_config(store, config, false)
                .await
                .context("Failed to load events")?;
            Ok(())
        }
    }
}
