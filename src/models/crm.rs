// src/models/crm.rs
// Estruturas auxiliares: notas do gestor, painel do admin e perfil do cliente.
use crate::models::subject::Subject;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Cliente tal como aparece na listagem do gestor (com as notas embutidas).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClient {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Debug, Serialize)]
pub struct NewNote<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct NotesResponse {
    #[serde(default)]
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    #[serde(default)]
    pub total_clients: i64,
    #[serde(default)]
    pub total_slots: i64,
    #[serde(default)]
    pub total_bookings: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub client_name: String,
    pub action: String, // "booked" ou "cancelled"
    #[serde(default)]
    pub slot_date: String,
    #[serde(default)]
    pub slot_time: String,
    pub timestamp: String,
}

impl ActivityEntry {
    pub fn is_booking(&self) -> bool {
        self.action == "booked"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileBooking {
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Resposta de GET /api/client/me.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub client: Subject,
    #[serde(default)]
    pub bookings: Vec<ProfileBooking>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmail<'a> {
    pub new_email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}
