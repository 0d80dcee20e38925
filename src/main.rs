use std::sync::Arc;

use colloquia::review::store::PgReviewStore;
use colloquia::{config, db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colloquia=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;

    let pool = db::create_pool(&config.database_url, config.max_connections).await?;
    db::run_migrations(pool.as_ref()).await?;

    let store = Arc::new(PgReviewStore::new(pool));
    let app_state = Arc::new(state::AppState { store });

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Colloquia listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
