// src/error.rs
use crate::services::api_client::ApiError;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Erro na base de dados de sessões: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Erro de variável de ambiente: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Configuração inválida: {0}")]
    Config(String),

    #[error("Erro na sessão: {0}")]
    SessionError(String),

    #[error("Erro ao renderizar template: {0}")]
    Template(#[from] askama::Error),

    #[error("Erro no backend: {0}")]
    Backend(ApiError),

    // Token em falta, ilegível ou expirado (local ou 401 do backend)
    #[error("Credencial expirada")]
    CredentialExpired,

    #[error("Acesso negado")]
    Forbidden,
}

// 401 do backend significa sessão morta: força novo login
impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AppError::CredentialExpired,
            other => AppError::Backend(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if let AppError::CredentialExpired = self {
            tracing::info!("Credencial expirada, a terminar sessão.");
            // /logout limpa a sessão e reencaminha para /login
            return Redirect::to("/logout").into_response();
        }

        tracing::error!("Erro processado: {:?}", self);

        let (status, user_message) = match self {
            AppError::SqlxError(_) | AppError::SessionError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Erro na gestão da sua sessão.")
            }
            AppError::EnvVarError(_) | AppError::Config(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Erro de configuração.")
            }
            AppError::Backend(_) => (StatusCode::BAD_GATEWAY, "O serviço de marcações não respondeu."),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Não tem permissão para aceder a esta página."),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado."),
        };

        (status, Html(format!(r#"
            <!DOCTYPE html><html><head><title>Erro</title><style>body{{font-family:sans-serif;}}</style></head>
            <body><h1>Erro {status_code}</h1><p>{message}</p><a href="/">Voltar</a></body></html>
         "#, status_code=status.as_u16(), message=user_message))).into_response()
    }
}

// Tipo Result padrão para a aplicação
pub type AppResult<T = ()> = Result<T, AppError>;
