// src/state.rs
use crate::services::api_client::ApiClient;

// As sessões ficam na camada do tower-sessions; os dados de negócio vivem no backend
#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
}

// Permite extrair o cliente do backend diretamente
impl axum::extract::FromRef<AppState> for ApiClient {
    fn from_ref(state: &AppState) -> ApiClient {
        state.api.clone()
    }
}
