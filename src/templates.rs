// src/templates.rs
use crate::{
    error::AppResult,
    models::{
        crm::{ActivityEntry, Note, Overview, ProfileBooking},
        slot::Slot,
        subject::{Role, Subject},
    },
    services::{
        availability::{eligibility, BlockReason, DateGroup, Eligibility, SubscriptionAlerts},
        slot_board::HourCell,
    },
};
use askama::Template;
use axum::response::Html;

/// Renderiza qualquer página; uma falha do Askama vira `AppError::Template`.
pub fn render<T: Template>(page: &T) -> AppResult<Html<String>> {
    match page.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Falha ao renderizar template: {}", e);
            Err(e.into())
        }
    }
}

// --- Peças partilhadas ---

/// Dados da barra de navegação (em todas as páginas autenticadas).
#[derive(Debug, Clone)]
pub struct Nav {
    pub full_name: String,
    pub role: &'static str,
    pub is_client: bool,
    pub is_admin: bool,
    pub is_manager: bool,
}

impl Nav {
    pub fn for_subject(subject: &Subject) -> Self {
        Self {
            full_name: subject.full_name.clone(),
            role: subject.role.as_str(),
            is_client: subject.role == Role::Client,
            is_admin: subject.role == Role::Admin,
            is_manager: subject.role == Role::Manager,
        }
    }
}

/// Mensagens de feedback (?success= / ?error=) e aviso de falha de leitura.
#[derive(Debug, Clone, Default)]
pub struct Flash {
    pub success: Option<String>,
    pub error: Option<String>,
    pub load_error: Option<String>,
}

// --- Marcações (cliente) ---

/// Um horário já traduzido para o que o cartão mostra.
#[derive(Debug, Clone)]
pub struct SlotCard {
    pub id: String,
    pub date: String,
    pub time: String,
    pub booked: usize,
    pub capacity: u32,
    pub can_book: bool,
    pub can_cancel: bool,
    pub blocked_label: String,
    // Página para onde voltar depois de marcar/cancelar
    pub back: String,
}

impl SlotCard {
    pub fn new(slot: &Slot, subject: &Subject, back: &str) -> Self {
        let verdict = eligibility(slot, subject);
        let blocked_label = match verdict.reason() {
            Some(BlockReason::NoSessions) => "Sem sessões disponíveis".to_string(),
            Some(BlockReason::Full) => "Lotado".to_string(),
            None => String::new(),
        };
        Self {
            id: slot.id.clone(),
            date: slot.date.clone(),
            time: slot.time.clone(),
            booked: slot.booked_count(),
            capacity: slot.max_clients,
            can_book: verdict == Eligibility::Book,
            can_cancel: verdict == Eligibility::Cancel,
            blocked_label,
            back: back.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DayView {
    pub date: String,
    pub slots: Vec<SlotCard>,
}

impl DayView {
    pub fn new(group: &DateGroup, subject: &Subject, back: &str) -> Self {
        Self {
            date: group.date.clone(),
            slots: group.slots.iter().map(|s| SlotCard::new(s, subject, back)).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "appointments.html")]
pub struct AppointmentsPage {
    pub nav: Nav,
    pub flash: Flash,
    pub alerts: SubscriptionAlerts,
    pub remaining: i64,
    pub total: i64,
    pub end_date: String,
    pub days: Vec<DayView>,
}

#[derive(Debug, Clone)]
pub struct DateOption {
    pub date: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "calendar.html")]
pub struct CalendarPage {
    pub nav: Nav,
    pub flash: Flash,
    pub dates: Vec<DateOption>,
    pub selected: Option<String>,
    pub slots: Vec<SlotCard>,
}

// --- Perfil do cliente ---

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub date: String,
    pub time: String,
    pub action: String,
    pub timestamp: String,
}

impl HistoryRow {
    /// Achata o histórico de cada marcação numa linha por evento.
    pub fn flatten(bookings: &[ProfileBooking]) -> Vec<HistoryRow> {
        bookings
            .iter()
            .flat_map(|b| {
                b.history.iter().map(move |h| HistoryRow {
                    date: b.date.clone(),
                    time: b.time.clone(),
                    action: h.action.clone(),
                    timestamp: h.timestamp.clone(),
                })
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "my_profile.html")]
pub struct MyProfilePage {
    pub nav: Nav,
    pub flash: Flash,
    pub full_name: String,
    pub email: String,
    pub total: i64,
    pub used: i64,
    pub remaining: i64,
    pub end_date: String,
    pub history: Vec<HistoryRow>,
}

// --- Admin ---

#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub client_name: String,
    pub is_booking: bool,
    pub slot_date: String,
    pub slot_time: String,
    pub timestamp: String,
}

impl From<&ActivityEntry> for ActivityRow {
    fn from(entry: &ActivityEntry) -> Self {
        Self {
            client_name: entry.client_name.clone(),
            is_booking: entry.is_booking(),
            slot_date: entry.slot_date.clone(),
            slot_time: entry.slot_time.clone(),
            timestamp: entry.timestamp.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage {
    pub nav: Nav,
    pub flash: Flash,
    pub overview: Overview,
    pub activity: Vec<ActivityRow>,
}

#[derive(Debug, Clone)]
pub struct ClientRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub used: i64,
    pub total: i64,
    pub usage_rate: String,
    pub end_date: String,
}

impl From<&Subject> for ClientRow {
    fn from(s: &Subject) -> Self {
        Self {
            id: s.id.clone(),
            full_name: s.full_name.clone(),
            email: s.email.clone(),
            used: s.used_sessions,
            total: s.total_sessions,
            usage_rate: s.usage_rate(),
            end_date: s.end_date.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "clients.html")]
pub struct ClientsPage {
    pub nav: Nav,
    pub flash: Flash,
    pub clients: Vec<ClientRow>,
    pub renew_start: String,
    pub renew_end: String,
}

#[derive(Template)]
#[template(path = "client_profile.html")]
pub struct ClientProfilePage {
    pub nav: Nav,
    pub flash: Flash,
    pub client: ClientRow,
    pub subscription_type: String,
    pub start_date: String,
    pub slots: Vec<Slot>,
}

/// Horário no quadro do admin, com os nomes dos participantes já resolvidos.
#[derive(Debug, Clone)]
pub struct BoardSlot {
    pub id: String,
    pub date: String,
    pub time: String,
    pub max_clients: u32,
    pub booked: usize,
    pub participants: Vec<String>,
    pub editable: bool,
}

#[derive(Debug, Clone)]
pub struct BoardDay {
    pub date: String,
    pub slots: Vec<BoardSlot>,
}

#[derive(Debug, Clone)]
pub struct ClientOption {
    pub id: String,
    pub full_name: String,
}

#[derive(Template)]
#[template(path = "slots_admin.html")]
pub struct SlotsAdminPage {
    pub nav: Nav,
    pub flash: Flash,
    pub selected_date: String,
    pub grid: Vec<HourCell>,
    pub today: Vec<BoardSlot>,
    pub upcoming: Vec<BoardDay>,
    pub past: Vec<BoardDay>,
    pub past_count: usize,
    pub show_past: bool,
    pub clients: Vec<ClientOption>,
}

// --- Gestor ---

#[derive(Debug, Clone)]
pub struct CrmRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub note_count: usize,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct NoteRow {
    pub text: String,
    pub created_at: String,
}

impl From<&Note> for NoteRow {
    fn from(note: &Note) -> Self {
        Self {
            text: note.text.clone(),
            created_at: note.created_at.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrmDetail {
    pub id: String,
    pub full_name: String,
    pub notes: Vec<NoteRow>,
}

#[derive(Template)]
#[template(path = "manager_crm.html")]
pub struct ManagerCrmPage {
    pub nav: Nav,
    pub flash: Flash,
    pub clients: Vec<CrmRow>,
    pub detail: Option<CrmDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::crm::HistoryEntry;

    fn subject(remaining: i64) -> Subject {
        serde_json::from_value(serde_json::json!({
            "_id": "c1", "fullName": "Maya", "role": "client",
            "totalSessions": 10, "usedSessions": 10 - remaining
        }))
        .unwrap()
    }

    fn slot(booked: &[&str], max: u32) -> Slot {
        Slot {
            id: "s1".into(),
            date: "2025-03-01".into(),
            time: "10:00".into(),
            max_clients: max,
            booked_clients: booked.iter().map(|b| b.to_string()).collect(),
        }
    }

    #[test]
    fn card_reflects_eligibility() {
        let card = SlotCard::new(&slot(&[], 2), &subject(3), "/appointments");
        assert!(card.can_book && !card.can_cancel);

        let mine = SlotCard::new(&slot(&["c1"], 1), &subject(0), "/appointments");
        assert!(mine.can_cancel && !mine.can_book);

        let blocked = SlotCard::new(&slot(&["x"], 1), &subject(0), "/appointments");
        assert_eq!(blocked.blocked_label, "Sem sessões disponíveis");
    }

    #[test]
    fn history_is_flattened_per_event() {
        let bookings = vec![ProfileBooking {
            date: "2025-01-02".into(),
            time: "10:00".into(),
            history: vec![
                HistoryEntry { timestamp: "t1".into(), action: "booked".into() },
                HistoryEntry { timestamp: "t2".into(), action: "cancelled".into() },
            ],
        }];
        let rows = HistoryRow::flatten(&bookings);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].action, "cancelled");
        assert_eq!(rows[1].date, "2025-01-02");
    }

    #[test]
    fn login_page_renders_error() {
        let html = LoginPage { error: Some("Credenciais inválidas".into()) }
            .render()
            .unwrap();
        assert!(html.contains("Credenciais inválidas"));
    }
}
