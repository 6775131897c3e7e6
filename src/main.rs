use tracing::info;

use vidhub::routes;
use vidhub::state::AppState;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Create and run the tokio runtime
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(run_application())
}

async fn run_application() -> color_eyre::Result<()> {
    setup_tracing()?;

    let app_state = AppState::from_env().await?;

    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("listening on {}", addr);

    axum::serve(listener, routes::routes(app_state)).await?;

    Ok(())
}

fn setup_tracing() -> color_eyre::Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    Ok(())
}
