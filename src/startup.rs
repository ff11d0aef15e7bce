use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::SessionService;
use crate::configuration::{Settings, StorageBackend};
use crate::logger::LoggerMiddleware;
use crate::routes::{create_user, health_check, login, refresh, revoke, update_user};
use crate::storage::{
    InMemoryRefreshTokenRepository, InMemoryUserStore, PgRefreshTokenRepository, PgUserStore,
    RefreshTokenRepository, UserStore,
};

/// Build the session service over the configured storage backend
pub async fn build_session_service(settings: &Settings) -> Result<SessionService, std::io::Error> {
    if settings.jwt.secret.is_empty() {
        tracing::error!("jwt.secret is empty; refusing to start");
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "JWT secret must not be empty",
        ));
    }

    let (users, tokens): (Arc<dyn UserStore>, Arc<dyn RefreshTokenRepository>) =
        match settings.storage.backend {
            StorageBackend::Postgres => {
                tracing::info!("Attempting to connect to database");
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&settings.database.connection_string())
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to create connection pool: {}", e);
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionRefused,
                            "Database connection error",
                        )
                    })?;
                tracing::info!("Database connection pool created successfully");
                (
                    Arc::new(PgUserStore::new(pool.clone())),
                    Arc::new(PgRefreshTokenRepository::new(pool)),
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; all state is lost on restart");
                (
                    Arc::new(InMemoryUserStore::new()),
                    Arc::new(InMemoryRefreshTokenRepository::new()),
                )
            }
        };

    SessionService::from_settings(&settings.jwt, &settings.password, users, tokens).map_err(|e| {
        tracing::error!("Failed to build credential hasher: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Password settings error")
    })
}

pub fn run(listener: TcpListener, sessions: SessionService) -> Result<Server, std::io::Error> {
    let sessions = web::Data::new(sessions);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .app_data(sessions.clone())
            .route("/api/healthz", web::get().to(health_check))
            .route("/api/users", web::post().to(create_user))
            .route("/api/users", web::put().to(update_user))
            .route("/api/login", web::post().to(login))
            .route("/api/refresh", web::post().to(refresh))
            .route("/api/revoke", web::post().to(revoke))
    })
    .listen(listener)?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{
        ApplicationSettings, DatabaseSettings, JwtSettings, PasswordSettings, StorageSettings,
    };

    fn memory_settings(secret: &str) -> Settings {
        Settings {
            database: DatabaseSettings {
                username: "postgres".to_string(),
                password: "password".to_string(),
                port: 5432,
                host: "127.0.0.1".to_string(),
                database_name: "chirpy".to_string(),
            },
            application: ApplicationSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            jwt: JwtSettings {
                secret: secret.to_string(),
                access_token_expiry: 3600,
                refresh_token_expiry: 5_184_000,
                issuer: "Chirpy".to_string(),
            },
            password: PasswordSettings { bcrypt_cost: 4 },
            storage: StorageSettings {
                backend: StorageBackend::Memory,
            },
        }
    }

    #[tokio::test]
    async fn test_empty_jwt_secret_is_refused() {
        let result = build_session_service(&memory_settings("")).await;

        let err = result.err().expect("empty secret must not build a service");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_memory_backend_builds() {
        assert!(build_session_service(&memory_settings("startup-secret")).await.is_ok());
    }
}
