use gameday_sync::Error;
use gameday_sync::config::{AppConfig, EnvFile};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let env_file = gameday_sync::config::load_env_file();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .try_init();

    match env_file {
        EnvFile::Loaded(path) => info!(path = %path.display(), "Loaded environment file"),
        EnvFile::Absent => {}
        EnvFile::Invalid(e) => warn!(error = %e, "Ignoring unusable environment file"),
    }

    let config = AppConfig::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    let summary = gameday_sync::handler::run(config).await?;

    for link in &summary.created_links {
        println!("{}", link);
    }
    Ok(())
}
