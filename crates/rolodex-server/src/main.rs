use anyhow::{Context, Result};
use rolodex_common::models::auth::Role;
use rolodex_db::{create_pool, run_migrations, NewUser, UserRepo};
use rolodex_server::auth::hash_password;
use rolodex_server::avatar::gravatar_url;
use rolodex_server::config::{load_config, InitialAdminConfig};
use rolodex_server::state::AppState;
use sqlx::PgPool;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Rolodex server");

    let config_path =
        std::env::var("ROLODEX_CONFIG").unwrap_or_else(|_| "server-config.yaml".to_string());
    tracing::info!("Loading config from: {}", config_path);
    let config = load_config(&config_path)?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.db.url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Running database migrations...");
    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    if let Some(admin) = &config.auth.initial_admin {
        seed_admin(&pool, admin).await?;
    }

    if config.mail.is_none() {
        tracing::warn!("No mail API configured, confirmation and reset emails will only be logged");
    }
    if config.avatar.is_none() {
        tracing::info!("Avatar uploads disabled");
    }

    let listen = config.listen.clone();
    let state = AppState::new(pool, config);
    let app = rolodex_server::web::build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;

    tracing::info!("Server listening on {}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Create the configured admin (already confirmed) unless the username or email is taken.
async fn seed_admin(pool: &PgPool, admin: &InitialAdminConfig) -> Result<()> {
    let by_name = UserRepo::get_by_username(pool, &admin.username).await?;
    let by_email = UserRepo::get_by_email(pool, &admin.email).await?;
    if by_name.is_some() || by_email.is_some() {
        tracing::info!("Initial admin '{}' already exists, skipping seed", admin.username);
        return Ok(());
    }

    let password_hash =
        hash_password(&admin.password).context("Failed to hash initial admin password")?;
    let avatar = gravatar_url(&admin.email);
    UserRepo::create(
        pool,
        uuid::Uuid::new_v4(),
        &NewUser {
            username: &admin.username,
            email: &admin.email,
            password_hash: &password_hash,
            role: Role::Admin,
            avatar: Some(&avatar),
            confirmed: true,
        },
    )
    .await
    .context("Failed to create initial admin")?;
    tracing::info!("Created initial admin: {}", admin.username);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping...");
}
