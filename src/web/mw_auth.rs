// src/web/mw_auth.rs
use crate::{error::AppResult, services::identity};
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// Middleware que verifica se há uma credencial válida na sessão
pub async fn require_auth(session: Session, mut request: Request, next: Next) -> AppResult<Response> {
    // A expiração é verificada localmente, sem ir ao backend
    let now_secs = chrono::Utc::now().timestamp();

    match identity::load(&session, now_secs).await? {
        Some(ctx) => {
            tracing::debug!(
                "Autenticação MW: sessão válida ({}). Prosseguindo...",
                ctx.role().map(|r| r.as_str()).unwrap_or("sem snapshot")
            );
            // Os handlers protegidos recebem o contexto via Extension
            request.extensions_mut().insert(ctx);
            Ok(next.run(request).await)
        }
        None => {
            tracing::debug!("Autenticação MW: sem sessão válida. Redirecionando para /login");
            Ok(Redirect::to("/login").into_response())
        }
    }
}
