// src/web/profile_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::crm::ProfileBooking,
    services::{
        api_client::ApiError,
        availability::local_timestamp,
        dispatcher::{feedback_redirect, Dispatcher},
        identity::{self, SessionContext},
    },
    state::AppState,
    templates::{self, HistoryRow, MyProfilePage, Nav},
    web::{local_now, FeedbackParams},
};
use axum::{
    extract::{Extension, Form, Query, State},
    response::{Html, Redirect},
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use tower_sessions::Session;

const MY_PROFILE: &str = "/my-profile";

#[derive(Deserialize, Debug)]
pub struct ChangeEmailForm {
    new_email: String,
}

#[derive(Deserialize, Debug)]
pub struct ChangePasswordForm {
    current_password: String,
    new_password: String,
}

/// Só marcações que já aconteceram entram no histórico.
fn past_bookings(bookings: Vec<ProfileBooking>, now: NaiveDateTime) -> Vec<ProfileBooking> {
    bookings
        .into_iter()
        .filter(|b| local_timestamp(&b.date, &b.time).is_some_and(|ts| ts < now))
        .collect()
}

// GET /my-profile
pub async fn my_profile_page(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<FeedbackParams>,
) -> AppResult<Html<String>> {
    let mut flash = params.into_flash();

    let (subject, bookings) = match state.api.my_profile(&ctx.token).await {
        Ok(profile) => (profile.client, profile.bookings),
        Err(ApiError::Unauthorized) => return Err(AppError::CredentialExpired),
        Err(e) => {
            tracing::warn!("Falha ao carregar o perfil: {}", e);
            flash.load_error = Some("Não foi possível carregar o histórico.".to_string());
            (identity::refresh(&state.api, &session, &ctx).await?, Vec::new())
        }
    };

    let history = HistoryRow::flatten(&past_bookings(bookings, local_now()));

    let page = MyProfilePage {
        nav: Nav::for_subject(&subject),
        flash,
        full_name: subject.full_name.clone(),
        email: subject.email.clone(),
        total: subject.total_sessions,
        used: subject.used_sessions,
        remaining: subject.remaining_sessions(),
        end_date: subject.end_date.clone().unwrap_or_default(),
        history,
    };
    templates::render(&page)
}

// POST /my-profile/email
pub async fn handle_change_email(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Form(form): Form<ChangeEmailForm>,
) -> AppResult<Redirect> {
    let new_email = form.new_email.trim().to_string();
    if new_email.is_empty() {
        return Ok(feedback_redirect(MY_PROFILE, "error", "Indique o novo email."));
    }
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("change-email", |api, token| async move { api.change_email(&token, &new_email).await })
        .await?;
    Ok(outcome.redirect(MY_PROFILE, "Email atualizado com sucesso!"))
}

// POST /my-profile/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    session: Session,
    Extension(ctx): Extension<SessionContext>,
    Form(form): Form<ChangePasswordForm>,
) -> AppResult<Redirect> {
    if form.current_password.is_empty() || form.new_password.is_empty() {
        return Ok(feedback_redirect(MY_PROFILE, "error", "Preencha a senha atual e a nova."));
    }
    let outcome = Dispatcher::new(&state.api, &session, &ctx)
        .run("change-password", |api, token| async move {
            api.change_password(&token, &form.current_password, &form.new_password)
                .await
        })
        .await?;
    Ok(outcome.redirect(MY_PROFILE, "Senha alterada com sucesso!"))
}
