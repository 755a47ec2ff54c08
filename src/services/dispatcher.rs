// src/services/dispatcher.rs
//! Despacho de mutações (marcar, cancelar, criar horário, notas...).
//! Nunca altera estado local: se o backend aceitar, o subject é atualizado
//! e a página seguinte volta a buscar os horários; se recusar, a mensagem
//! do backend segue para o utilizador.
use crate::{
    error::{AppError, AppResult},
    services::{
        api_client::{ApiClient, ApiError},
        identity::{self, SessionContext},
    },
};
use axum::response::Redirect;
use std::future::Future;
use tower_sessions::Session;

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    Rejected(String),
}

impl<T> Outcome<T> {
    /// Redirect (Post/Redirect/Get) com a mensagem de feedback na query string.
    pub fn redirect(&self, target: &str, success_message: &str) -> Redirect {
        match self {
            Outcome::Applied(_) => feedback_redirect(target, "success", success_message),
            Outcome::Rejected(message) => feedback_redirect(target, "error", message),
        }
    }
}

pub fn feedback_redirect(target: &str, kind: &str, message: &str) -> Redirect {
    let separator = if target.contains('?') { '&' } else { '?' };
    let url = format!("{}{}{}={}", target, separator, kind, urlencoding::encode(message));
    Redirect::to(&url)
}

pub struct Dispatcher<'a> {
    api: &'a ApiClient,
    session: &'a Session,
    ctx: &'a SessionContext,
}

impl<'a> Dispatcher<'a> {
    pub fn new(api: &'a ApiClient, session: &'a Session, ctx: &'a SessionContext) -> Self {
        Self { api, session, ctx }
    }

    /// Executa a chamada e, em caso de sucesso, atualiza a identidade.
    /// Um 401 termina a sessão; qualquer outra falha vira `Outcome::Rejected`.
    pub async fn run<T, F, Fut>(&self, label: &str, call: F) -> AppResult<Outcome<T>>
    where
        F: FnOnce(ApiClient, String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        tracing::info!("Mutação '{}' pedida.", label);
        match call(self.api.clone(), self.ctx.token.clone()).await {
            Ok(value) => {
                // Os contadores de sessões podem ter mudado no backend
                if let Err(e) = identity::refresh(self.api, self.session, self.ctx).await {
                    if matches!(e, AppError::CredentialExpired) {
                        return Err(e);
                    }
                    tracing::warn!("Mutação '{}' aplicada, mas o refresh falhou: {}", label, e);
                }
                tracing::info!("✅ Mutação '{}' aplicada.", label);
                Ok(Outcome::Applied(value))
            }
            Err(ApiError::Unauthorized) => Err(AppError::CredentialExpired),
            Err(e) => {
                tracing::warn!("Mutação '{}' recusada: {}", label, e);
                Ok(Outcome::Rejected(e.user_message()))
            }
        }
    }
}
