// src/services/identity.rs
//! Fornecedor de identidade: o único sítio que lê e escreve o token e o
//! snapshot do subject na sessão.
use crate::{
    error::{AppError, AppResult},
    models::subject::{LoginResponse, Role, Subject},
    services::{
        api_client::{ApiClient, ApiError},
        credential,
    },
};
use tower_sessions::Session;

pub const TOKEN_KEY: &str = "token";
// Snapshot usado apenas para desenhar antes do primeiro refresh
pub const SUBJECT_KEY: &str = "client";

/// Contexto de uma sessão autenticada, posto nas extensões pelo `require_auth`.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub token: String,
    pub snapshot: Option<Subject>,
}

impl SessionContext {
    pub fn role(&self) -> Option<Role> {
        self.snapshot.as_ref().map(|s| s.role)
    }
}

fn session_err(e: tower_sessions::session::Error) -> AppError {
    AppError::SessionError(e.to_string())
}

/// Carrega o contexto da sessão. Um token expirado limpa tudo e devolve `None`.
pub async fn load(session: &Session, now_secs: i64) -> AppResult<Option<SessionContext>> {
    let Some(token) = session.get::<String>(TOKEN_KEY).await.map_err(session_err)? else {
        return Ok(None);
    };

    if credential::is_expired(&token, now_secs) {
        tracing::info!("Token da sessão expirado. A limpar estado persistido.");
        clear(session).await?;
        return Ok(None);
    }

    // Um snapshot corrompido não invalida a sessão; o refresh repõe-no
    let snapshot = session
        .get::<Subject>(SUBJECT_KEY)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Snapshot do subject ilegível: {}", e);
            None
        });

    Ok(Some(SessionContext { token, snapshot }))
}

/// Guarda o resultado de um login bem-sucedido.
pub async fn establish(session: &Session, login: LoginResponse) -> AppResult<Subject> {
    session.cycle_id().await.map_err(session_err)?;
    session.insert(TOKEN_KEY, &login.token).await.map_err(session_err)?;
    session
        .insert(SUBJECT_KEY, &login.client)
        .await
        .map_err(session_err)?;
    tracing::info!("✅ Sessão iniciada para {} ({})", login.client.email, login.client.role.as_str());
    Ok(login.client)
}

/// Vai buscar o subject atual ao backend e atualiza o snapshot.
/// Se o backend falhar (exceto 401), usa o snapshot anterior quando existe.
pub async fn refresh(api: &ApiClient, session: &Session, ctx: &SessionContext) -> AppResult<Subject> {
    match api.me(&ctx.token).await {
        Ok(subject) => {
            session
                .insert(SUBJECT_KEY, &subject)
                .await
                .map_err(session_err)?;
            tracing::debug!("Subject {} atualizado a partir do backend.", subject.id);
            Ok(subject)
        }
        Err(ApiError::Unauthorized) => Err(AppError::CredentialExpired),
        Err(e) => match &ctx.snapshot {
            Some(snapshot) => {
                tracing::warn!("Falha ao atualizar o subject ({}); a usar snapshot.", e);
                Ok(snapshot.clone())
            }
            None => Err(e.into()),
        },
    }
}

/// Subject da sessão sem ir ao backend quando já há snapshot.
pub async fn current(api: &ApiClient, session: &Session, ctx: &SessionContext) -> AppResult<Subject> {
    match &ctx.snapshot {
        Some(snapshot) => Ok(snapshot.clone()),
        None => refresh(api, session, ctx).await,
    }
}

/// Apaga token e snapshot juntos (logout ou credencial expirada).
pub async fn clear(session: &Session) -> AppResult<()> {
    session.flush().await.map_err(session_err)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::api_client::tests::spawn_backend;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::{sync::Arc, time::Duration};
    use tower_sessions_sqlx_store::SqliteStore;

    pub(crate) async fn memory_session() -> Session {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::new(pool);
        store.migrate().await.unwrap();
        Session::new(None, Arc::new(store), None)
    }

    pub(crate) fn token_expiring_at(exp: i64) -> String {
        format!(
            "h.{}.s",
            URL_SAFE_NO_PAD.encode(json!({ "id": "c1", "exp": exp }).to_string())
        )
    }

    pub(crate) fn subject_json(id: &str, used: i64) -> serde_json::Value {
        json!({
            "_id": id, "fullName": "Maya", "email": "m@x.io", "role": "client",
            "totalSessions": 10, "usedSessions": used, "adminId": "adm"
        })
    }

    #[tokio::test]
    async fn empty_session_has_no_context() {
        let session = memory_session().await;
        assert!(load(&session, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_token_clears_both_values() {
        let session = memory_session().await;
        let login: LoginResponse = serde_json::from_value(json!({
            "token": token_expiring_at(100),
            "client": subject_json("c1", 0)
        }))
        .unwrap();
        establish(&session, login).await.unwrap();

        let ctx = load(&session, 50).await.unwrap().expect("ainda válido");
        assert_eq!(ctx.role(), Some(Role::Client));

        assert!(load(&session, 100).await.unwrap().is_none());
        assert!(session.get::<String>(TOKEN_KEY).await.unwrap().is_none());
        assert!(session.get::<Subject>(SUBJECT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_updates_snapshot() {
        let app = Router::new().route(
            "/api/auth/me",
            get(|| async { Json(json!({ "client": subject_json("c1", 7) })) }),
        );
        let api = ApiClient::new(spawn_backend(app).await, Duration::from_secs(5)).unwrap();
        let session = memory_session().await;
        let ctx = SessionContext {
            token: token_expiring_at(i64::MAX),
            snapshot: None,
        };

        let subject = refresh(&api, &session, &ctx).await.unwrap();
        assert_eq!(subject.used_sessions, 7);
        let stored = session.get::<Subject>(SUBJECT_KEY).await.unwrap().unwrap();
        assert_eq!(stored.used_sessions, 7);
    }

    #[tokio::test]
    async fn refresh_falls_back_to_snapshot_on_backend_failure() {
        let app = Router::new().route(
            "/api/auth/me",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let api = ApiClient::new(spawn_backend(app).await, Duration::from_secs(5)).unwrap();
        let session = memory_session().await;
        let snapshot: Subject = serde_json::from_value(subject_json("c1", 3)).unwrap();

        let with_snapshot = SessionContext {
            token: "t".into(),
            snapshot: Some(snapshot.clone()),
        };
        assert_eq!(refresh(&api, &session, &with_snapshot).await.unwrap(), snapshot);

        let without = SessionContext {
            token: "t".into(),
            snapshot: None,
        };
        assert!(matches!(
            refresh(&api, &session, &without).await,
            Err(AppError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn refresh_with_rejected_token_forces_logout() {
        let app = Router::new().route("/api/auth/me", get(|| async { StatusCode::UNAUTHORIZED }));
        let api = ApiClient::new(spawn_backend(app).await, Duration::from_secs(5)).unwrap();
        let session = memory_session().await;
        let ctx = SessionContext {
            token: "t".into(),
            snapshot: None,
        };
        assert!(matches!(
            refresh(&api, &session, &ctx).await,
            Err(AppError::CredentialExpired)
        ));
    }
}
