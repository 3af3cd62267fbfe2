use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_users::handlers::{self, UsersState};
use domain_users::{AuthService, EncryptService, PgUserRepository, TokenService, UserService};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use tracing::info;

mod config;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Before any fallible operation
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .max_connections(config.database.max_connections)
        .connect_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;
    info!("Connected to PostgreSQL");

    Migrator::up(&db, None)
        .await
        .map_err(|e| eyre::eyre!("Migrations failed: {}", e))?;
    info!("Migrations applied");

    let repository = Arc::new(PgUserRepository::new(db.clone()));
    let encrypt = EncryptService::new(&config.password)
        .map_err(|e| eyre::eyre!("Invalid password hashing parameters: {}", e))?;
    let tokens = TokenService::new(&config.tokens);

    let state = UsersState {
        auth: AuthService::new(repository.clone(), encrypt.clone(), tokens),
        users: UserService::new(repository, encrypt),
    };

    let apis: Router = handlers::router(state);
    let app = axum_helpers::create_router(apis, &config.server);

    info!(
        "Starting accounts API ({}s graceful shutdown timeout)",
        config.server.shutdown_timeout.as_secs()
    );

    axum_helpers::serve(app, &config.server)
        .await
        .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    match db.close().await {
        Ok(_) => info!("PostgreSQL connection closed"),
        Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
    }

    info!("Accounts API shutdown complete");
    Ok(())
}
