// src/web/auth_handlers.rs
use crate::{
    error::AppResult,
    models::subject::{LoginForm, Role},
    services::{api_client::ApiError, identity},
    state::AppState,
    templates::{self, LoginPage},
};
use axum::{
    extract::{Form, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// Página inicial de uma sessão já carregada (sem snapshot, assume-se cliente)
fn home_for(role: Option<Role>) -> &'static str {
    role.unwrap_or_default().home_path()
}

// GET / - reencaminha conforme o papel da sessão
pub async fn root_redirect(session: Session) -> AppResult<Redirect> {
    let ctx = identity::load(&session, chrono::Utc::now().timestamp()).await?;
    Ok(match ctx {
        Some(ctx) => Redirect::to(home_for(ctx.role())),
        None => Redirect::to("/login"),
    })
}

// GET /login
pub async fn show_login_form(session: Session) -> AppResult<Response> {
    if let Some(ctx) = identity::load(&session, chrono::Utc::now().timestamp()).await? {
        tracing::debug!("GET /login: sessão já ativa, redirecionando.");
        return Ok(Redirect::to(home_for(ctx.role())).into_response());
    }
    Ok(templates::render(&LoginPage { error: None })?.into_response())
}

// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    tracing::info!("Tentativa de login para: {}", form.email);

    // 1. Pede a credencial ao backend
    let error = match state.api.login(form.email.trim(), &form.password).await {
        Ok(login) => {
            // 2. Guarda token + snapshot e segue para a página do papel
            let subject = identity::establish(&session, login).await?;
            return Ok(Redirect::to(subject.role.home_path()).into_response());
        }
        Err(ApiError::Unauthorized) => {
            tracing::warn!("Credenciais inválidas para: {}", form.email);
            "Email ou senha inválidos.".to_string()
        }
        Err(e) => {
            tracing::warn!("Login falhou para {}: {}", form.email, e);
            e.user_message()
        }
    };

    // 3. Volta a mostrar o formulário com o erro
    Ok(templates::render(&LoginPage { error: Some(error) })?.into_response())
}

// GET /logout
pub async fn handle_logout(session: Session) -> AppResult<Redirect> {
    identity::clear(&session).await?;
    tracing::info!("🚪 Sessão terminada.");
    Ok(Redirect::to("/login"))
}
