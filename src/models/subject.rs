// src/models/subject.rs
use serde::{Deserialize, Serialize};

/// Papéis possíveis de um utilizador autenticado (conjunto fechado).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Client,
    Admin,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
            Role::Manager => "manager",
        }
    }

    /// Página inicial de cada papel depois do login.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Client => "/appointments",
            Role::Admin => "/admin/dashboard",
            Role::Manager => "/manager/crm",
        }
    }
}

/// O "subject" da sessão: cliente, admin ou gestor, com o estado da assinatura.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub total_sessions: i64,
    #[serde(default)]
    pub used_sessions: i64,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    // Admin "dono" deste cliente (filtra os horários visíveis)
    #[serde(default)]
    pub admin_id: Option<String>,
    #[serde(default)]
    pub subscription_type: Option<String>,
}

impl Subject {
    /// Diferença bruta total - usado (pode ser negativa se o backend divergir).
    pub fn raw_remaining(&self) -> i64 {
        self.total_sessions - self.used_sessions
    }

    /// Sessões restantes, nunca negativas.
    pub fn remaining_sessions(&self) -> i64 {
        self.raw_remaining().max(0)
    }

    /// Taxa de utilização em percentagem, arredondada ("0%" sem sessões).
    pub fn usage_rate(&self) -> String {
        if self.total_sessions == 0 {
            return "0%".to_string();
        }
        let rate = (self.used_sessions as f64 / self.total_sessions as f64) * 100.0;
        format!("{}%", rate.round() as i64)
    }

    /// Que horários este subject pode ver. Clientes ficam sempre presos ao
    /// seu admin; um cliente sem admin não vê horário nenhum.
    pub fn slot_scope(&self) -> SlotScope<'_> {
        match (self.role, self.admin_id.as_deref()) {
            (Role::Client, Some(admin_id)) if !admin_id.trim().is_empty() => SlotScope::Tenant(admin_id),
            (Role::Client, _) => SlotScope::Unowned,
            _ => SlotScope::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotScope<'a> {
    All,
    Tenant(&'a str),
    Unowned,
}

// --- Formulários e payloads ---

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub client: Subject,
}

/// Campos editáveis de um cliente (página de perfil do admin).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectUpdate {
    pub full_name: String,
    pub email: String,
    pub total_sessions: i64,
    pub used_sessions: i64,
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewSubscription {
    pub subscription_type: String,
    pub total_sessions: i64,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub total_sessions: i64,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub admin_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_backend_shape() {
        let json = r#"{
            "_id": "c1", "fullName": "Dana", "email": "d@x.io",
            "totalSessions": 10, "usedSessions": 4,
            "endDate": "2025-05-01", "role": "client", "adminId": "a9"
        }"#;
        let subject: Subject = serde_json::from_str(json).unwrap();
        assert_eq!(subject.id, "c1");
        assert_eq!(subject.role, Role::Client);
        assert_eq!(subject.remaining_sessions(), 6);
        assert_eq!(subject.slot_scope(), SlotScope::Tenant("a9"));
    }

    #[test]
    fn missing_role_defaults_to_client() {
        let subject: Subject = serde_json::from_str(r#"{"_id": "c2"}"#).unwrap();
        assert_eq!(subject.role, Role::Client);
        assert_eq!(subject.slot_scope(), SlotScope::Unowned);
    }

    #[test]
    fn client_without_admin_stays_scoped() {
        let owned_by_nobody: Subject =
            serde_json::from_str(r#"{"_id": "c9", "role": "client", "adminId": ""}"#).unwrap();
        assert_eq!(owned_by_nobody.slot_scope(), SlotScope::Unowned);
        let manager: Subject = serde_json::from_str(r#"{"_id": "m1", "role": "manager"}"#).unwrap();
        assert_eq!(manager.slot_scope(), SlotScope::All);
    }

    #[test]
    fn remaining_never_negative() {
        let subject: Subject =
            serde_json::from_str(r#"{"_id": "c3", "totalSessions": 3, "usedSessions": 5}"#).unwrap();
        assert_eq!(subject.raw_remaining(), -2);
        assert_eq!(subject.remaining_sessions(), 0);
    }

    #[test]
    fn usage_rate_rounds() {
        let mut subject: Subject = serde_json::from_str(r#"{"_id": "c4"}"#).unwrap();
        assert_eq!(subject.usage_rate(), "0%");
        subject.total_sessions = 3;
        subject.used_sessions = 2;
        assert_eq!(subject.usage_rate(), "67%");
    }

    #[test]
    fn admins_see_all_slots() {
        let subject: Subject =
            serde_json::from_str(r#"{"_id": "a1", "role": "admin", "adminId": "x"}"#).unwrap();
        assert_eq!(subject.slot_scope(), SlotScope::All);
        assert_eq!(subject.role.home_path(), "/admin/dashboard");
    }
}
