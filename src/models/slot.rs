// src/models/slot.rs
use serde::{Deserialize, Serialize};

/// Um horário (slot) tal como a API do backend o devolve.
/// A data e a hora vêm como texto ("2025-03-01" / "10:00") e são
/// interpretadas no relógio local, sem fuso horário.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "maxClients", default)]
    pub max_clients: u32,
    // O backend garante len <= max_clients, mas aceitamos violações transitórias
    #[serde(rename = "bookedClients", default)]
    pub booked_clients: Vec<String>,
}

impl Slot {
    pub fn booked_count(&self) -> usize {
        self.booked_clients.len()
    }

    /// Verifica se o cliente indicado já está inscrito neste horário.
    pub fn is_booked_by(&self, subject_id: &str) -> bool {
        self.booked_clients.iter().any(|id| id == subject_id)
    }

    pub fn is_full(&self) -> bool {
        self.booked_count() >= self.max_clients as usize
    }
}

// --- Payloads enviados ao backend ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlot {
    pub date: String,
    pub time: String,
    pub max_clients: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCapacityUpdate {
    pub max_clients: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddClientToSlot {
    pub client_id: String,
}
