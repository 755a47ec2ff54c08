// src/web/booking_handlers.rs
// Páginas do cliente: marcações agrupadas por dia, calendário e as ações marcar/cancelar.
use crate::{
    error::{AppError, AppResult},
    models::{slot::Slot, subject::Subject},
    services::{
        api_client::ApiError,
        availability::{compute_alerts, derive_upcoming_groups, eligibility, slot_timestamp, BlockReason, Eligibility},
        dispatcher::{feedback_redirect, Dispatcher},
        identity::{self, SessionContext},
        slot_directory,
    },
    state::AppState,
    templates::{self, AppointmentsPage, CalendarPage, DateOption, DayView, Flash, Nav, SlotCard},
    web::{local_now, FeedbackParams},
};
use axum::{
    extract::{Extension, Form, Path, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;

const APPOINTMENTS: &str = "/appointments";

#[derive(Deserialize, Debug, Default)]
pub struct CalendarParams {
    pub date: Option<String>,
    pub success: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct BackForm {
    pub back: Option<String>,
}

// Só caminhos locais; qualquer outra coisa volta às marcações.
// Os browsers leem "/\" como "//": ambos contam como externos.
fn safe_back(back: Option<String>) -> String {
    match back {
        Some(b) if is_local_path(&b) => b,
        _ => APPOINTMENTS.to_string(),
    }
}

fn is_local_path(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/') | Some('\\'))
        && !path.chars().any(|c| c.is_control())
}

fn blocked_message(reason: BlockReason) -> &'static str {
    match reason {
        BlockReason::NoSessions => "Não tem sessões disponíveis na sua assinatura.",
        BlockReason::Full => "Este horário está lotado.",
    }
}

/// Horários visíveis para o subject. Uma falha de leitura não é erro de página:
/// devolve lista vazia e o aviso para mostrar.
async fn load_slots(state: &AppState, ctx: &SessionContext, subject: &Subject) -> AppResult<(Vec<Slot>, Option<String>)> {
    match slot_directory::fetch_for(&state.api, &ctx.token, subject).await {
        Ok(slots) => Ok((slots, None)),
        Err(ApiError::Unauthorized) => Err(AppError::CredentialExpired),
        Err(e) => {
            tracing::warn!("Falha ao carregar horários: {}", e);
            Ok((Vec::new(), Some("Não foi possível carregar os horários.".to_string())))
        }
    }
}

// GET /appointments
pub async fn appointments_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<FeedbackParams>,
) -> AppResult<Html<String>> {
    // 1. Subject atualizado (contadores de sessões) e horários
    let subject = identity::refresh(&state.api, &session, &ctx).await?;
    let (slots, load_error) = load_slots(&state, &ctx, &subject).await?;

    // 2. Derivação pura
    let now = local_now();
    let upcoming = derive_upcoming_groups(&slots, now);
    let alerts = compute_alerts(&subject, now);
    if upcoming.is_empty() {
        tracing::debug!("Nenhum horário futuro para {}.", subject.id);
    }

    let mut flash = params.into_flash();
    flash.load_error = load_error;

    let page = AppointmentsPage {
        nav: Nav::for_subject(&subject),
        flash,
        alerts,
        remaining: subject.remaining_sessions(),
        total: subject.total_sessions,
        end_date: subject.end_date.clone().unwrap_or_default(),
        days: upcoming
            .groups
            .iter()
            .map(|g| DayView::new(g, &subject, APPOINTMENTS))
            .collect(),
    };
    templates::render(&page)
}

// GET /calendar?date=YYYY-MM-DD
pub async fn calendar_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<CalendarParams>,
) -> AppResult<Html<String>> {
    let subject = identity::refresh(&state.api, &session, &ctx).await?;
    let (slots, load_error) = load_slots(&state, &ctx, &subject).await?;
    let upcoming = derive_upcoming_groups(&slots, local_now());

    // Sem data pedida, mostra o primeiro dia com horários
    let selected = params
        .date
        .filter(|d| !d.trim().is_empty())
        .or_else(|| upcoming.available_dates().first().map(|d| d.to_string()));

    let cards: Vec<SlotCard> = match &selected {
        Some(date) => {
            let back = format!("/calendar?date={}", urlencoding::encode(date));
            upcoming
                .group(date)
                .map(|g| g.slots.iter().map(|s| SlotCard::new(s, &subject, &back)).collect())
                .unwrap_or_default()
        }
        None => Vec::new(),
    };

    let dates = upcoming
        .available_dates()
        .into_iter()
        .map(|d| DateOption {
            date: d.to_string(),
            selected: selected.as_deref() == Some(d),
        })
        .collect();

    let page = CalendarPage {
        nav: Nav::for_subject(&subject),
        flash: Flash {
            success: params.success,
            error: params.error,
            load_error,
        },
        dates,
        selected,
        slots: cards,
    };
    templates::render(&page)
}

// POST /appointments/{id}/book
pub async fn handle_book(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(slot_id): Path<String>,
    Form(form): Form<BackForm>,
) -> AppResult<Redirect> {
    let back = safe_back(form.back);

    // 1. Verificação local (indicativa) contra horários acabados de buscar
    let subject = identity::refresh(&state.api, &session, &ctx).await?;
    match slot_directory::fetch_for(&state.api, &ctx.token, &subject).await {
        Ok(slots) => {
            if let Some(slot) = slots.iter().find(|s| s.id == slot_id) {
                if slot_timestamp(slot).map(|ts| ts < local_now()).unwrap_or(false) {
                    return Ok(feedback_redirect(&back, "error", "Este horário já passou."));
                }
                let verdict = eligibility(slot, &subject);
                tracing::debug!("Verificação local de {}: {}", slot_id, verdict.action());
                match verdict {
                    Eligibility::Book => {}
                    Eligibility::Cancel => {
                        return Ok(feedback_redirect(&back, "error", "Já está inscrito neste horário."));
                    }
                    Eligibility::Blocked(reason) => {
                        return Ok(feedback_redirect(&back, "error", blocked_message(reason)));
                    }
                }
            }
        }
        Err(ApiError::Unauthorized) => return Err(AppError::CredentialExpired),
        // O backend decide na mesma
        Err(e) => tracing::warn!("Verificação prévia indisponível: {}", e),
    }

    // 2. O backend é o árbitro final
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("book", |api, token| async move { api.book_slot(&token, &slot_id).await })
        .await?;
    Ok(outcome.redirect(&back, "Marcação confirmada!"))
}

// POST /appointments/{id}/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Path(slot_id): Path<String>,
    Form(form): Form<BackForm>,
) -> AppResult<Redirect> {
    let back = safe_back(form.back);
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("cancel", |api, token| async move { api.cancel_slot(&token, &slot_id).await })
        .await?;
    Ok(outcome.redirect(&back, "Marcação cancelada."))
}
