// src/services/api_client.rs
//! Cliente HTTP da API do backend. Todo o estado verdadeiro (horários,
//! assinaturas, notas) vive lá; aqui só se fazem pedidos com o token Bearer.
use crate::models::{
    crm::{
        ActivityEntry, ChangeEmail, ChangePassword, ManagedClient, NewNote, Note, NotesResponse,
        Overview, ProfileResponse,
    },
    slot::{AddClientToSlot, NewSlot, Slot, SlotCapacityUpdate},
    subject::{LoginRequest, LoginResponse, NewSubject, RenewSubscription, Subject, SubjectUpdate},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("falha de comunicação com o backend: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credencial rejeitada pelo backend")]
    Unauthorized,

    // Mensagem legível enviada pelo backend, mostrada tal como vem
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("resposta inesperada do backend: {0}")]
    Decode(String),
}

impl ApiError {
    /// Texto para mostrar ao utilizador depois de uma ação falhada.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::Transport(_) => "Não foi possível contactar o servidor.".to_string(),
            ApiError::Unauthorized => "A sua sessão expirou.".to_string(),
            ApiError::Decode(_) => "Resposta inválida do servidor.".to_string(),
        }
    }
}

// Corpo de erro do backend: { "error": "..." } (às vezes "message")
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

// GET /api/auth/me devolve { client: {...} } ou o subject diretamente
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MeResponse {
    Wrapped { client: Subject },
    Bare(Subject),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("agenda_crm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    fn post(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    fn put(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    fn delete(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    /// Envia o pedido e converte respostas de erro em `ApiError`.
    async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("Backend respondeu 401.");
            return Err(ApiError::Unauthorized);
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| format!("Pedido recusado pelo servidor ({}).", status.as_u16()));
        tracing::debug!("Backend recusou o pedido ({}): {}", status, message);
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // O corpo das respostas de mutação não é usado: a página volta a buscar tudo
    async fn submit(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    // --- Autenticação / identidade ---

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest { email, password });
        self.fetch(request).await
    }

    pub async fn me(&self, token: &str) -> Result<Subject, ApiError> {
        match self.fetch::<MeResponse>(self.get(token, "/api/auth/me")).await? {
            MeResponse::Wrapped { client } => Ok(client),
            MeResponse::Bare(subject) => Ok(subject),
        }
    }

    // --- Horários ---

    pub async fn list_slots(&self, token: &str, tenant: Option<&str>) -> Result<Vec<Slot>, ApiError> {
        let mut request = self.get(token, "/api/admin/slots");
        if let Some(admin_id) = tenant {
            request = request.query(&[("adminId", admin_id)]);
        }
        self.fetch(request).await
    }

    pub async fn book_slot(&self, token: &str, slot_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/slots/{}/book", seg(slot_id));
        self.submit(self.post(token, &path).json(&serde_json::json!({}))).await
    }

    pub async fn cancel_slot(&self, token: &str, slot_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/slots/{}/cancel", seg(slot_id));
        self.submit(self.post(token, &path).json(&serde_json::json!({}))).await
    }

    /// Cancelamento feito pelo admin em nome de um cliente.
    pub async fn cancel_slot_for(&self, token: &str, slot_id: &str, client_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/slots/{}/cancel", seg(slot_id));
        let body = serde_json::json!({ "clientId": client_id });
        self.submit(self.post(token, &path).json(&body)).await
    }

    pub async fn create_slot(&self, token: &str, slot: &NewSlot) -> Result<(), ApiError> {
        self.submit(self.post(token, "/api/admin/slot").json(slot)).await
    }

    pub async fn delete_slot(&self, token: &str, slot_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/admin/slot/{}", seg(slot_id));
        self.submit(self.delete(token, &path)).await
    }

    pub async fn update_slot_capacity(
        &self,
        token: &str,
        slot_id: &str,
        update: &SlotCapacityUpdate,
    ) -> Result<(), ApiError> {
        let path = format!("/api/admin/slot/{}", seg(slot_id));
        self.submit(self.put(token, &path).json(update)).await
    }

    pub async fn add_client_to_slot(
        &self,
        token: &str,
        slot_id: &str,
        payload: &AddClientToSlot,
    ) -> Result<(), ApiError> {
        let path = format!("/api/admin/slot/{}/add-client", seg(slot_id));
        self.submit(self.put(token, &path).json(payload)).await
    }

    // --- Clientes (admin) ---

    pub async fn list_subjects(&self, token: &str) -> Result<Vec<Subject>, ApiError> {
        self.fetch(self.get(token, "/api/admin/clients")).await
    }

    pub async fn get_subject(&self, token: &str, subject_id: &str) -> Result<Subject, ApiError> {
        let path = format!("/api/admin/client/{}", seg(subject_id));
        self.fetch(self.get(token, &path)).await
    }

    pub async fn subject_slots(&self, token: &str, subject_id: &str) -> Result<Vec<Slot>, ApiError> {
        let path = format!("/api/admin/client/{}/slots", seg(subject_id));
        self.fetch(self.get(token, &path)).await
    }

    pub async fn update_subject(
        &self,
        token: &str,
        subject_id: &str,
        update: &SubjectUpdate,
    ) -> Result<(), ApiError> {
        let path = format!("/api/admin/client/{}", seg(subject_id));
        self.submit(self.put(token, &path).json(update)).await
    }

    pub async fn renew_subscription(
        &self,
        token: &str,
        subject_id: &str,
        renewal: &RenewSubscription,
    ) -> Result<(), ApiError> {
        let path = format!("/api/admin/client/{}/renew", seg(subject_id));
        self.submit(self.put(token, &path).json(renewal)).await
    }

    pub async fn delete_subject(&self, token: &str, subject_id: &str) -> Result<(), ApiError> {
        let path = format!("/api/admin/client/{}", seg(subject_id));
        self.submit(self.delete(token, &path)).await
    }

    pub async fn register_subject(&self, token: &str, subject: &NewSubject) -> Result<(), ApiError> {
        self.submit(self.post(token, "/api/auth/register").json(subject)).await
    }

    /// Relatório de utilização em CSV, devolvido tal como vem.
    pub async fn export_usage_report(&self, token: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .execute(self.get(token, "/api/admin/report/usage/export"))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn overview(&self, token: &str) -> Result<Overview, ApiError> {
        self.fetch(self.get(token, "/api/admin/overview")).await
    }

    pub async fn recent_activity(&self, token: &str) -> Result<Vec<ActivityEntry>, ApiError> {
        self.fetch(self.get(token, "/api/admin/recent-activity")).await
    }

    // --- Gestor (CRM) ---

    /// Clientes do gestor com as notas embutidas (não há rota própria para as notas).
    pub async fn manager_clients(&self, token: &str) -> Result<Vec<ManagedClient>, ApiError> {
        self.fetch(self.get(token, "/api/manager/clients")).await
    }

    /// Grava a nota e devolve a lista de notas atualizada pelo backend.
    pub async fn record_note(&self, token: &str, client_id: &str, text: &str) -> Result<Vec<Note>, ApiError> {
        let path = format!("/api/manager/client/{}/notes", seg(client_id));
        let response: NotesResponse = self
            .fetch(self.post(token, &path).json(&NewNote { text }))
            .await?;
        Ok(response.notes)
    }

    // --- Perfil do próprio cliente ---

    pub async fn my_profile(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        self.fetch(self.get(token, "/api/client/me")).await
    }

    pub async fn change_email(&self, token: &str, new_email: &str) -> Result<(), ApiError> {
        self.submit(
            self.put(token, "/api/client/change-email")
                .json(&ChangeEmail { new_email }),
        )
        .await
    }

    pub async fn change_password(&self, token: &str, current: &str, new: &str) -> Result<(), ApiError> {
        let body = ChangePassword {
            current_password: current,
            new_password: new,
        };
        self.submit(self.put(token, "/api/client/change-password").json(&body))
            .await
    }
}

// IDs vão no caminho: codificar para não partir a URL
fn seg(id: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id)
}
