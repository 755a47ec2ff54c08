// src/web/admin_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        crm::ActivityEntry,
        slot::{AddClientToSlot, NewSlot, Slot, SlotCapacityUpdate},
        subject::{NewSubject, RenewSubscription, SubjectUpdate},
    },
    services::{
        api_client::{ApiClient, ApiError},
        availability::{local_timestamp, DateGroup},
        dispatcher::{feedback_redirect, Dispatcher},
        identity::{self, SessionContext},
        slot_board::{hour_grid, is_editable, SlotBoard},
        slot_directory,
    },
    state::AppState,
    templates::{
        self, ActivityRow, BoardDay, BoardSlot, ClientOption, ClientProfilePage, ClientRow, ClientsPage,
        DashboardPage, Flash, Nav, SlotsAdminPage,
    },
    web::{local_now, FeedbackParams},
};
use axum::{
    extract::{Extension, Form, Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use futures_util::future::join_all;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tower_sessions::Session;

const CLIENTS: &str = "/admin/clients";
const SLOTS: &str = "/admin/slots";
const RECENT_ACTIVITY_LIMIT: usize = 10;
const DEFAULT_RENEW_SESSIONS: i64 = 10;
const DEFAULT_RENEW_DAYS: i64 = 60;
const UNKNOWN_PARTICIPANT: &str = "(desconhecido)";

// --- Structs para os Formulários ---
// Os números chegam como texto: um campo vazio não deve dar 400

#[derive(Deserialize, Debug)]
pub struct RegisterClientForm {
    full_name: String,
    email: String,
    password: String,
    #[serde(default)]
    total_sessions: String,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct RenewForm {
    #[serde(default)]
    subscription_type: String,
    #[serde(default)]
    total_sessions: String,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
}

#[derive(Deserialize, Debug)]
pub struct EditClientForm {
    full_name: String,
    email: String,
    #[serde(default)]
    total_sessions: String,
    #[serde(default)]
    used_sessions: String,
    #[serde(default)]
    subscription_type: String,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct SlotBoardParams {
    date: Option<String>,
    #[serde(default)]
    past: bool,
    success: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct NewSlotForm {
    date: String,
    time: String,
    #[serde(default)]
    max_clients: String,
}

#[derive(Deserialize, Debug)]
pub struct CapacityForm {
    max_clients: String,
}

#[derive(Deserialize, Debug)]
pub struct AddClientForm {
    client_id: String,
}

// --- Auxiliares ---

fn ymd(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

fn parse_count(raw: &str, default: i64) -> Result<i64, &'static str> {
    match raw.trim() {
        "" => Ok(default),
        n => match n.parse::<i64>() {
            Ok(v) if v >= 0 => Ok(v),
            _ => Err("O número de sessões tem de ser um inteiro positivo."),
        },
    }
}

fn parse_capacity(raw: &str) -> Result<u32, &'static str> {
    match raw.trim().parse::<u32>() {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err("A capacidade tem de ser pelo menos 1."),
    }
}

/// Renovação com os valores por omissão: basic, 10 sessões, hoje até hoje+60.
fn renewal_from_form(form: &RenewForm, today: NaiveDate) -> Result<RenewSubscription, &'static str> {
    Ok(RenewSubscription {
        subscription_type: non_empty(&form.subscription_type).unwrap_or_else(|| "basic".to_string()),
        total_sessions: parse_count(&form.total_sessions, DEFAULT_RENEW_SESSIONS)?,
        start_date: non_empty(&form.start_date).unwrap_or_else(|| ymd(today)),
        end_date: non_empty(&form.end_date)
            .unwrap_or_else(|| ymd(today + TimeDelta::days(DEFAULT_RENEW_DAYS))),
    })
}

/// As 10 entradas mais recentes, da mais nova para a mais antiga.
/// Timestamps ilegíveis ficam no fim.
fn latest_activity(mut entries: Vec<ActivityEntry>) -> Vec<ActivityEntry> {
    let key = |e: &ActivityEntry| DateTime::parse_from_rfc3339(&e.timestamp).ok();
    entries.sort_by(|a, b| key(b).cmp(&key(a)));
    entries.truncate(RECENT_ACTIVITY_LIMIT);
    entries
}

// Leitura falhada: aviso no log e valor vazio; só o 401 sobe como erro
fn or_empty<T: Default>(result: Result<T, ApiError>, what: &str, notice: &mut Option<String>) -> AppResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::Unauthorized) => Err(AppError::CredentialExpired),
        Err(e) => {
            tracing::warn!("Falha ao carregar {}: {}", what, e);
            *notice = Some(format!("Não foi possível carregar {}.", what));
            Ok(T::default())
        }
    }
}

// --- Painel ---

// GET /admin/dashboard
pub async fn dashboard_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<FeedbackParams>,
) -> AppResult<Html<String>> {
    let admin = identity::current(&state.api, &session, &ctx).await?;

    // As duas leituras são independentes
    let (overview, activity) = tokio::join!(
        state.api.overview(&ctx.token),
        state.api.recent_activity(&ctx.token)
    );

    let mut flash = params.into_flash();
    let overview = or_empty(overview, "o resumo", &mut flash.load_error)?;
    let activity = or_empty(activity, "a atividade recente", &mut flash.load_error)?;

    let page = DashboardPage {
        nav: Nav::for_subject(&admin),
        flash,
        overview,
        activity: latest_activity(activity).iter().map(ActivityRow::from).collect(),
    };
    templates::render(&page)
}

// --- Clientes ---

// GET /admin/clients
pub async fn clients_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<FeedbackParams>,
) -> AppResult<Html<String>> {
    let admin = identity::current(&state.api, &session, &ctx).await?;
    let mut flash = params.into_flash();
    let clients = or_empty(state.api.list_subjects(&ctx.token).await, "os clientes", &mut flash.load_error)?;

    let today = local_now().date();
    let page = ClientsPage {
        nav: Nav::for_subject(&admin),
        flash,
        clients: clients.iter().map(ClientRow::from).collect(),
        renew_start: ymd(today),
        renew_end: ymd(today + TimeDelta::days(DEFAULT_RENEW_DAYS)),
    };
    templates::render(&page)
}

// POST /admin/clients
pub async fn handle_register_client(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Form(form): Form<RegisterClientForm>,
) -> AppResult<Redirect> {
    tracing::info!("Registo de cliente pedido: {}", form.email);

    let total_sessions = match parse_count(&form.total_sessions, 0) {
        Ok(n) => n,
        Err(msg) => return Ok(feedback_redirect(CLIENTS, "error", msg)),
    };
    if form.full_name.trim().is_empty() || form.email.trim().is_empty() || form.password.is_empty() {
        return Ok(feedback_redirect(CLIENTS, "error", "Nome, email e senha são obrigatórios."));
    }

    // O cliente fica associado ao admin que o regista
    let admin = identity::current(&state.api, &session, &ctx).await?;
    let today = local_now().date();
    let new_client = NewSubject {
        full_name: form.full_name.trim().to_string(),
        email: form.email.trim().to_string(),
        password: form.password,
        total_sessions,
        start_date: non_empty(&form.start_date).unwrap_or_else(|| ymd(today)),
        end_date: non_empty(&form.end_date)
            .unwrap_or_else(|| ymd(today + TimeDelta::days(DEFAULT_RENEW_DAYS))),
        admin_id: Some(admin.id),
    };

    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("register-client", |api, token| async move {
            api.register_subject(&token, &new_client).await
        })
        .await?;
    Ok(outcome.redirect(CLIENTS, "Cliente registado com sucesso!"))
}

// POST /admin/clients/{id}/renew
pub async fn handle_renew(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(client_id): Path<String>,
    Form(form): Form<RenewForm>,
) -> AppResult<Redirect> {
    let renewal = match renewal_from_form(&form, local_now().date()) {
        Ok(r) => r,
        Err(msg) => return Ok(feedback_redirect(CLIENTS, "error", msg)),
    };
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("renew", |api, token| async move {
            api.renew_subscription(&token, &client_id, &renewal).await
        })
        .await?;
    Ok(outcome.redirect(CLIENTS, "Assinatura renovada!"))
}

// POST /admin/clients/{id}/delete
pub async fn handle_delete_client(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(client_id): Path<String>,
) -> AppResult<Redirect> {
    tracing::info!("Remoção do cliente {} pedida.", client_id);
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("delete-client", |api, token| async move { api.delete_subject(&token, &client_id).await })
        .await?;
    Ok(outcome.redirect(CLIENTS, "Cliente apagado."))
}

// GET /admin/clients/export
pub async fn export_usage_report(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> AppResult<Response> {
    match state.api.export_usage_report(&ctx.token).await {
        Ok(csv) => Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"usage_report.csv\""),
            ],
            csv,
        )
            .into_response()),
        Err(ApiError::Unauthorized) => Err(AppError::CredentialExpired),
        Err(e) => {
            tracing::warn!("Falha ao exportar relatório: {}", e);
            Ok(feedback_redirect(CLIENTS, "error", &e.user_message()).into_response())
        }
    }
}

// --- Perfil de um cliente ---

fn client_path(client_id: &str) -> String {
    format!("{}/{}", CLIENTS, urlencoding::encode(client_id))
}

// GET /admin/clients/{id}
pub async fn client_profile_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(client_id): Path<String>,
    Query(params): Query<FeedbackParams>,
) -> AppResult<Response> {
    let admin = identity::current(&state.api, &session, &ctx).await?;

    let client = match state.api.get_subject(&ctx.token, &client_id).await {
        Ok(c) => c,
        Err(ApiError::Unauthorized) => return Err(AppError::CredentialExpired),
        Err(e) => {
            tracing::warn!("Falha ao carregar o cliente {}: {}", client_id, e);
            return Ok(feedback_redirect(CLIENTS, "error", &e.user_message()).into_response());
        }
    };

    let mut flash = params.into_flash();
    let mut slots = or_empty(
        state.api.subject_slots(&ctx.token, &client_id).await,
        "os horários do cliente",
        &mut flash.load_error,
    )?;
    slots.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));

    let page = ClientProfilePage {
        nav: Nav::for_subject(&admin),
        flash,
        client: ClientRow::from(&client),
        subscription_type: client.subscription_type.clone().unwrap_or_default(),
        start_date: client.start_date.clone().unwrap_or_default(),
        slots,
    };
    Ok(templates::render(&page)?.into_response())
}

// POST /admin/clients/{id}
pub async fn handle_edit_client(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(client_id): Path<String>,
    Form(form): Form<EditClientForm>,
) -> AppResult<Redirect> {
    let back = client_path(&client_id);
    let (total_sessions, used_sessions) =
        match (parse_count(&form.total_sessions, 0), parse_count(&form.used_sessions, 0)) {
            (Ok(t), Ok(u)) => (t, u),
            (Err(msg), _) | (_, Err(msg)) => return Ok(feedback_redirect(&back, "error", msg)),
        };

    let update = SubjectUpdate {
        full_name: form.full_name.trim().to_string(),
        email: form.email.trim().to_string(),
        total_sessions,
        used_sessions,
        subscription_type: non_empty(&form.subscription_type),
        start_date: non_empty(&form.start_date),
        end_date: non_empty(&form.end_date),
    };
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("edit-client", |api, token| async move {
            api.update_subject(&token, &client_id, &update).await
        })
        .await?;
    Ok(outcome.redirect(&back, "Dados do cliente atualizados!"))
}

// POST /admin/clients/{id}/slots/{slot}/cancel
pub async fn handle_cancel_client_slot(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path((client_id, slot_id)): Path<(String, String)>,
) -> AppResult<Redirect> {
    let back = client_path(&client_id);
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("cancel-for-client", |api, token| async move {
            api.cancel_slot_for(&token, &slot_id, &client_id).await
        })
        .await?;
    Ok(outcome.redirect(&back, "Marcação do cliente cancelada."))
}

// --- Quadro de horários ---

/// Nomes dos participantes, pedidos em paralelo. Uma falha mostra um marcador.
async fn participant_names(api: &ApiClient, token: &str, slots: &[&Slot]) -> HashMap<String, String> {
    let ids: BTreeSet<&str> = slots
        .iter()
        .flat_map(|s| s.booked_clients.iter().map(String::as_str))
        .collect();

    let lookups = ids.iter().map(|id| async move {
        let name = match api.get_subject(token, id).await {
            Ok(subject) => subject.full_name,
            Err(e) => {
                tracing::debug!("Nome do participante {} indisponível: {}", id, e);
                UNKNOWN_PARTICIPANT.to_string()
            }
        };
        (id.to_string(), name)
    });
    join_all(lookups).await.into_iter().collect()
}

fn board_slot(slot: &Slot, names: &HashMap<String, String>, now: NaiveDateTime) -> BoardSlot {
    BoardSlot {
        id: slot.id.clone(),
        date: slot.date.clone(),
        time: slot.time.clone(),
        max_clients: slot.max_clients,
        booked: slot.booked_count(),
        participants: slot
            .booked_clients
            .iter()
            .map(|id| names.get(id).cloned().unwrap_or_else(|| UNKNOWN_PARTICIPANT.to_string()))
            .collect(),
        editable: is_editable(slot, now),
    }
}

// GET /admin/slots?date=YYYY-MM-DD&past=true
pub async fn slots_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<SlotBoardParams>,
) -> AppResult<Html<String>> {
    let admin = identity::current(&state.api, &session, &ctx).await?;
    let now = local_now();
    let today = now.date();

    // Data da grelha: a pedida, se for válida; senão hoje
    let selected_date = params
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        .map(ymd)
        .unwrap_or_else(|| ymd(today));

    let mut flash = Flash {
        success: params.success,
        error: params.error,
        load_error: None,
    };
    let (slots, clients) = tokio::join!(
        slot_directory::fetch_for(&state.api, &ctx.token, &admin),
        state.api.list_subjects(&ctx.token)
    );
    let slots = or_empty(slots, "os horários", &mut flash.load_error)?;
    let clients = or_empty(clients, "os clientes", &mut flash.load_error)?;

    let board = SlotBoard::build(&slots, today);

    // Só se resolvem nomes dos horários que vão ser mostrados
    let mut shown: Vec<&Slot> = board.today.iter().collect();
    shown.extend(board.upcoming.iter().flat_map(|g| g.slots.iter()));
    if params.past {
        shown.extend(board.past.iter().flat_map(|g| g.slots.iter()));
    }
    let names = participant_names(&state.api, &ctx.token, &shown).await;

    let to_days = |groups: &[DateGroup]| -> Vec<BoardDay> {
        groups
            .iter()
            .map(|g| BoardDay {
                date: g.date.clone(),
                slots: g.slots.iter().map(|s| board_slot(s, &names, now)).collect(),
            })
            .collect()
    };

    let page = SlotsAdminPage {
        nav: Nav::for_subject(&admin),
        flash,
        grid: hour_grid(&slots, &selected_date, now),
        selected_date,
        today: board.today.iter().map(|s| board_slot(s, &names, now)).collect(),
        upcoming: to_days(&board.upcoming),
        past: if params.past { to_days(&board.past) } else { Vec::new() },
        past_count: board.past.len(),
        show_past: params.past,
        clients: clients
            .iter()
            .map(|c| ClientOption {
                id: c.id.clone(),
                full_name: c.full_name.clone(),
            })
            .collect(),
    };
    templates::render(&page)
}

// POST /admin/slots
pub async fn handle_create_slot(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Form(form): Form<NewSlotForm>,
) -> AppResult<Redirect> {
    let back = format!("{}?date={}", SLOTS, urlencoding::encode(form.date.trim()));

    let max_clients = if form.max_clients.trim().is_empty() {
        1
    } else {
        match parse_capacity(&form.max_clients) {
            Ok(n) => n,
            Err(msg) => return Ok(feedback_redirect(&back, "error", msg)),
        }
    };
    match local_timestamp(&form.date, &form.time) {
        Some(ts) if ts > local_now() => {}
        Some(_) => return Ok(feedback_redirect(&back, "error", "Não é possível criar horários no passado.")),
        None => return Ok(feedback_redirect(&back, "error", "Data ou hora inválida.")),
    }

    let new_slot = NewSlot {
        date: form.date.trim().to_string(),
        time: form.time.trim().to_string(),
        max_clients,
    };
    tracing::info!("Criação de horário {} {} (capacidade {}).", new_slot.date, new_slot.time, max_clients);
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("create-slot", |api, token| async move { api.create_slot(&token, &new_slot).await })
        .await?;
    Ok(outcome.redirect(&back, "Horário criado!"))
}

// POST /admin/slots/{id}/delete
pub async fn handle_delete_slot(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(slot_id): Path<String>,
) -> AppResult<Redirect> {
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("delete-slot", |api, token| async move { api.delete_slot(&token, &slot_id).await })
        .await?;
    Ok(outcome.redirect(SLOTS, "Horário apagado."))
}

/// Recusa editar horários que já passaram (mensagem de erro se for o caso).
async fn past_slot_guard(state: &AppState, ctx: &SessionContext, slot_id: &str) -> AppResult<Option<&'static str>> {
    match state.api.list_slots(&ctx.token, None).await {
        Ok(slots) => Ok(slots
            .iter()
            .find(|s| s.id == slot_id)
            .filter(|s| !is_editable(s, local_now()))
            .map(|_| "Horários passados não podem ser editados.")),
        Err(ApiError::Unauthorized) => Err(AppError::CredentialExpired),
        Err(e) => {
            // O backend decide na mesma
            tracing::warn!("Verificação do horário {} indisponível: {}", slot_id, e);
            Ok(None)
        }
    }
}

// POST /admin/slots/{id}/capacity
pub async fn handle_update_capacity(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(slot_id): Path<String>,
    Form(form): Form<CapacityForm>,
) -> AppResult<Redirect> {
    let update = match parse_capacity(&form.max_clients) {
        Ok(max_clients) => SlotCapacityUpdate { max_clients },
        Err(msg) => return Ok(feedback_redirect(SLOTS, "error", msg)),
    };
    if let Some(msg) = past_slot_guard(&state, &ctx, &slot_id).await? {
        return Ok(feedback_redirect(SLOTS, "error", msg));
    }
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("slot-capacity", |api, token| async move {
            api.update_slot_capacity(&token, &slot_id, &update).await
        })
        .await?;
    Ok(outcome.redirect(SLOTS, "Capacidade atualizada."))
}

// POST /admin/slots/{id}/clients
pub async fn handle_add_client_to_slot(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(slot_id): Path<String>,
    Form(form): Form<AddClientForm>,
) -> AppResult<Redirect> {
    if form.client_id.trim().is_empty() {
        return Ok(feedback_redirect(SLOTS, "error", "Escolha um cliente."));
    }
    if let Some(msg) = past_slot_guard(&state, &ctx, &slot_id).await? {
        return Ok(feedback_redirect(SLOTS, "error", msg));
    }
    let payload = AddClientToSlot {
        client_id: form.client_id.trim().to_string(),
    };
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("add-client-to-slot", |api, token| async move {
            api.add_client_to_slot(&token, &slot_id, &payload).await
        })
        .await?;
    Ok(outcome.redirect(SLOTS, "Cliente adicionado ao horário."))
}
