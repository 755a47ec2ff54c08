// src/web/mod.rs
pub mod admin_handlers;
pub mod auth_handlers;
pub mod booking_handlers;
pub mod manager_handlers;
pub mod mw_auth;
pub mod mw_role;
pub mod profile_handlers;
pub mod routes;

use crate::templates::Flash;
use chrono::NaiveDateTime;
use serde::Deserialize;

/// Mensagens deixadas na query string pelo redirect de uma mutação.
#[derive(Deserialize, Debug, Default)]
pub struct FeedbackParams {
    pub success: Option<String>,
    pub error: Option<String>,
}

impl FeedbackParams {
    pub fn into_flash(self) -> Flash {
        Flash {
            success: self.success,
            error: self.error,
            load_error: None,
        }
    }
}

/// Relógio de parede local: os horários do backend não têm fuso.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
