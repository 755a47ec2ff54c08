// src/web/mw_role.rs
use crate::{
    error::{AppError, AppResult},
    models::subject::Role,
    services::identity::{self, SessionContext},
    state::AppState,
};
use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

/// Só admins. Deve ser executado *depois* do `require_auth`.
pub async fn require_admin(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    check_role(&state, &session, &ctx, Role::Admin).await?;
    Ok(next.run(request).await)
}

/// Só gestores. Deve ser executado *depois* do `require_auth`.
pub async fn require_manager(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    check_role(&state, &session, &ctx, Role::Manager).await?;
    Ok(next.run(request).await)
}

async fn check_role(state: &AppState, session: &Session, ctx: &SessionContext, wanted: Role) -> AppResult<()> {
    // Sem snapshot (sessão antiga), pergunta-se ao backend
    let role = identity::current(&state.api, session, ctx).await?.role;

    if role == wanted {
        tracing::debug!("Role MW: acesso '{}' concedido.", wanted.as_str());
        Ok(())
    } else {
        tracing::warn!("Role MW: acesso negado ('{}' exigido, sessão é '{}').", wanted.as_str(), role.as_str());
        Err(AppError::Forbidden)
    }
}
