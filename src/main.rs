use std::sync::Arc;

use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use souk::api::{ApiClient, ApiConfig};
use souk::app::App;
use souk::runtime::Runtime;

/// Log to the file named by `SOUK_LOG`, so tracing output never lands in the
/// terminal the UI is drawing into. Without the variable, logging stays off.
fn init_tracing() {
    let Ok(path) = std::env::var("SOUK_LOG") else {
        return;
    };
    let Ok(file) = std::fs::File::create(&path) else {
        return;
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let client = Arc::new(ApiClient::new(ApiConfig::from_env())?);

    // Setup terminal
    let mut terminal = ratatui::init();

    // Run the console at 60 FPS
    let runtime = Runtime::<App>::new(client);
    let result = runtime.run(&mut terminal, 60).await;

    // Restore terminal
    ratatui::restore();

    result
}
