// src/config.rs
use crate::error::{AppError, AppResult};
use std::{env, net::SocketAddr, str::FromStr, time::Duration};

/// Configuração lida das variáveis de ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// URL base da API do backend (ex: https://api.exemplo.com)
    pub backend_url: String,
    /// Base SQLite onde ficam as sessões
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub session_idle_days: i64,
    pub backend_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let backend_url = env::var("BACKEND_URL")?;
        let backend_url = backend_url.trim_end_matches('/').to_string();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://sessions.db".to_string());

        let bind_addr = parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let session_idle_days = parse_or("SESSION_IDLE_DAYS", 1i64)?;
        let timeout_secs = parse_or("BACKEND_TIMEOUT_SECS", 15u64)?;

        Ok(Self {
            backend_url,
            database_url,
            bind_addr,
            session_idle_days,
            backend_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// Lê uma variável opcional; se existir mas não for válida, é erro de configuração
fn parse_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            tracing::error!("Valor inválido para {}: '{}'", key, raw);
            AppError::Config(format!("{} inválido", key))
        }),
        Err(_) => Ok(default),
    }
}
