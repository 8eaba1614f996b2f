use anyhow::Result;
use clap::Parser;
use phoneme_survey::{Config, ContactSubmitter, HttpBackend, JsonFileStore, SurveyBackend};
use std::sync::Arc;
use tracing::{info, warn};

/// Connectivity check and pending-contact flush for the phoneme survey client
#[derive(Debug, Parser)]
#[command(name = "phoneme-survey", version)]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/phoneme-survey")]
    config: String,

    /// Only check the backend, leave the pending queue untouched
    #[arg(long)]
    check_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Phoneme survey client v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", cfg.backend.base_url);

    let backend: Arc<dyn SurveyBackend> = Arc::new(HttpBackend::new(&cfg.backend)?);

    match backend.fetch_phonemes().await {
        Ok(phonemes) => info!("Backend reachable, {} survey items", phonemes.len()),
        Err(e) => {
            warn!("Backend unreachable: {}", e);
            return Ok(());
        }
    }

    if args.check_only {
        return Ok(());
    }

    let store = Arc::new(JsonFileStore::new(cfg.storage.pending_path()));
    info!("Pending contact queue: {}", store.path().display());

    let contacts = ContactSubmitter::new(backend, store, cfg.contact.clone());
    let report = contacts.submit_pending().await?;

    info!(
        "Pending contacts: {} resubmitted, {} remaining",
        report.resubmitted, report.remaining
    );

    Ok(())
}
