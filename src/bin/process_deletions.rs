use std::env;
use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use evistro_backend::deletion::DeletionWorkflow;
use evistro_backend::services::supabase::{DataStore, SupabaseAuth, SupabaseRest};

/// Drains the queued account deletions once and exits. Intended to run from
/// cron or by hand; every action is appended to `deletion_log.txt` next to
/// the working directory and echoed to stdout.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let supabase_url = env::var("SUPABASE_URL")
        .context("SUPABASE_URL is not set. Add it to your environment or a .env file")?;
    let service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY").context(
        "SUPABASE_SERVICE_ROLE_KEY is not set. Add it to your environment or a .env file",
    )?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("deletion_log.txt")
        .context("could not open deletion_log.txt for appending")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout.and(Arc::new(log_file)))
        .with_ansi(false)
        .init();

    let client = Client::new();
    let store: Arc<dyn DataStore> = Arc::new(SupabaseRest::new(
        client.clone(),
        supabase_url.clone(),
        service_role_key.clone(),
    ));
    let auth = Arc::new(SupabaseAuth::new(
        client,
        supabase_url,
        service_role_key.clone(),
        service_role_key,
    ));

    // Fail fast when the queue table is missing so a half-configured project
    // reads as a setup problem, not an empty run.
    if let Err(err) = store.select("deletion_requests", &[], None, Some(1)).await {
        error!(?err, "deletion_requests probe failed");
        bail!(
            "deletion_requests is not reachable. Run the deletion queue setup SQL \
             against your project, then try again"
        );
    }

    let workflow = DeletionWorkflow::new(store, auth);

    let report = workflow
        .process_queued_deletions()
        .await
        .context("failed to drain the deletion queue")?;

    info!(
        processed = report.processed,
        failed = report.failed,
        "deletion queue drained"
    );
    println!("Processed {}, failed {}", report.processed, report.failed);

    Ok(())
}
