// src/web/manager_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::crm::{ManagedClient, Note},
    services::{
        api_client::ApiError,
        dispatcher::{feedback_redirect, Dispatcher, Outcome},
        identity::{self, SessionContext},
    },
    state::AppState,
    templates::{self, CrmDetail, CrmRow, Flash, ManagerCrmPage, Nav, NoteRow},
};
use axum::{
    extract::{Extension, Form, Path, Query, State},
    response::{Html, Redirect},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

// Notas devolvidas pelo backend ao gravar, lidas uma vez pela página seguinte
const RECORDED_NOTES_KEY: &str = "crm.recorded_notes";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct RecordedNotes {
    client_id: String,
    notes: Vec<Note>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CrmParams {
    client: Option<String>,
    success: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct NoteForm {
    text: String,
}

fn crm_path(client_id: &str) -> String {
    format!("/manager/crm?client={}", urlencoding::encode(client_id))
}

/// Notas de um cliente: as acabadas de devolver pelo backend, se forem deste
/// cliente; senão as da listagem do gestor.
fn detail_for(clients: &[ManagedClient], client_id: &str, recorded: Option<&RecordedNotes>) -> Option<CrmDetail> {
    clients.iter().find(|c| c.id == client_id).map(|c| CrmDetail {
        id: c.id.clone(),
        full_name: c.full_name.clone(),
        notes: notes_of(c, recorded).iter().map(NoteRow::from).collect(),
    })
}

fn notes_of<'a>(client: &'a ManagedClient, recorded: Option<&'a RecordedNotes>) -> &'a [Note] {
    match recorded {
        Some(r) if r.client_id == client.id => &r.notes,
        _ => &client.notes,
    }
}

// GET /manager/crm?client=ID
pub async fn crm_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<CrmParams>,
) -> AppResult<Html<String>> {
    let manager = identity::current(&state.api, &session, &ctx).await?;

    let mut flash = Flash {
        success: params.success,
        error: params.error,
        load_error: None,
    };
    let clients = match state.api.manager_clients(&ctx.token).await {
        Ok(clients) => clients,
        Err(ApiError::Unauthorized) => return Err(AppError::CredentialExpired),
        Err(e) => {
            tracing::warn!("Falha ao carregar clientes do gestor: {}", e);
            flash.load_error = Some("Não foi possível carregar os clientes.".to_string());
            Vec::new()
        }
    };

    let recorded = session
        .remove::<RecordedNotes>(RECORDED_NOTES_KEY)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Notas gravadas ilegíveis na sessão: {}", e);
            None
        });

    let selected = params.client.as_deref().unwrap_or_default();
    let page = ManagerCrmPage {
        nav: Nav::for_subject(&manager),
        flash,
        clients: clients
            .iter()
            .map(|c| CrmRow {
                id: c.id.clone(),
                full_name: c.full_name.clone(),
                email: c.email.clone(),
                note_count: notes_of(c, recorded.as_ref()).len(),
                selected: c.id == selected,
            })
            .collect(),
        detail: detail_for(&clients, selected, recorded.as_ref()),
    };
    templates::render(&page)
}

// POST /manager/crm/{id}/notes
pub async fn handle_add_note(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(client_id): Path<String>,
    Form(form): Form<NoteForm>,
) -> AppResult<Redirect> {
    let back = crm_path(&client_id);

    // Nota em branco nem chega ao backend
    let text = form.text.trim().to_string();
    if text.is_empty() {
        return Ok(feedback_redirect(&back, "error", "A nota não pode estar vazia."));
    }

    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("add-note", |api, token| {
            let client_id = client_id.clone();
            async move { api.record_note(&token, &client_id, &text).await }
        })
        .await?;

    // A lista que conta é a devolvida pelo backend
    if let Outcome::Applied(notes) = &outcome {
        tracing::info!("✅ Nota gravada; o cliente tem agora {} notas.", notes.len());
        let recorded = RecordedNotes {
            client_id,
            notes: notes.clone(),
        };
        session
            .insert(RECORDED_NOTES_KEY, &recorded)
            .await
            .map_err(|e| AppError::SessionError(e.to_string()))?;
    }
    Ok(outcome.redirect(&back, "Nota guardada!"))
}
