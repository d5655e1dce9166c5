use anyhow::Context;

use tenantbase_core::AppConfig;
use tenantbase_http::{build_router, check_database, start_server, AppState, HttpError};

use super::{connect_database, migrate};

/// Connect, migrate when configured to, then serve HTTP until shutdown
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect_database(config).await?;

    if let Err(e) = check_database(pool.as_ref()).await {
        pool.close().await;
        return Err(logged(e)).context("Refusing to start");
    }

    if config.migrations.run_on_startup {
        tracing::info!(scheme = %config.migrations.scheme, "Running pending migrations");
        if let Err(e) = migrate::apply_pending(config, pool.clone()).await {
            pool.close().await;
            return Err(e.context("Startup migrations failed"));
        }
    }

    let router = build_router(AppState::new(pool.clone()));
    let result = start_server(config.bind_address(), router).await;
    pool.close().await;

    result.map_err(logged).context("HTTP server failed")
}

fn logged(err: HttpError) -> HttpError {
    tracing::error!(code = err.error_code(), error = %err, "Server failure");
    err
}
