// src/services/availability.rs
//! Derivação (pura) do que a página de marcações mostra: horários futuros
//! agrupados por dia, o veredito de elegibilidade de cada horário e os
//! alertas da assinatura. Nada aqui faz I/O; o `now` é sempre recebido.
use crate::models::{slot::Slot, subject::Subject};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::collections::HashMap;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const EXPIRY_WARNING_DAYS: i64 = 7;

/// Horários de um mesmo dia, já ordenados por hora.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup {
    pub date: String,
    pub slots: Vec<Slot>,
}

/// Horário ignorado por ter data/hora ilegível.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotWarning {
    pub slot_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpcomingSlots {
    pub groups: Vec<DateGroup>,
    pub warnings: Vec<SlotWarning>,
}

impl UpcomingSlots {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, date: &str) -> Option<&DateGroup> {
        self.groups.iter().find(|g| g.date == date)
    }

    /// Datas que têm pelo menos um horário futuro (ordem cronológica).
    pub fn available_dates(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.date.as_str()).collect()
    }
}

/// Junta a data e a hora do slot num instante local (sem conversão de fuso).
pub fn slot_timestamp(slot: &Slot) -> Result<NaiveDateTime, SlotWarning> {
    let warn = |reason: String| SlotWarning {
        slot_id: slot.id.clone(),
        reason,
    };
    let date = NaiveDate::parse_from_str(slot.date.trim(), "%Y-%m-%d")
        .map_err(|e| warn(format!("data inválida '{}': {}", slot.date, e)))?;
    let time = parse_time(slot.time.trim())
        .ok_or_else(|| warn(format!("hora inválida '{}'", slot.time)))?;
    Ok(date.and_time(time))
}

/// Mesma composição de `slot_timestamp` para pares data/hora soltos
/// (ex: marcações do histórico do perfil).
pub fn local_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_time(parse_time(time.trim())?))
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Filtra os horários a partir de `now`, ordena (instante, depois id) e agrupa
/// pela string da data, mantendo a ordem em que cada dia aparece.
pub fn derive_upcoming_groups(slots: &[Slot], now: NaiveDateTime) -> UpcomingSlots {
    let mut warnings = Vec::new();
    let mut upcoming: Vec<(NaiveDateTime, &Slot)> = Vec::with_capacity(slots.len());

    for slot in slots {
        match slot_timestamp(slot) {
            Ok(ts) if ts >= now => upcoming.push((ts, slot)),
            Ok(_) => {}
            Err(w) => {
                tracing::warn!("Horário {} ignorado: {}", w.slot_id, w.reason);
                warnings.push(w);
            }
        }
    }

    upcoming.sort_by(|(ta, a), (tb, b)| ta.cmp(tb).then_with(|| a.id.cmp(&b.id)));

    let mut groups: Vec<DateGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (_, slot) in upcoming {
        let pos = *index.entry(slot.date.as_str()).or_insert_with(|| {
            groups.push(DateGroup {
                date: slot.date.clone(),
                slots: Vec::new(),
            });
            groups.len() - 1
        });
        groups[pos].slots.push(slot.clone());
    }

    UpcomingSlots { groups, warnings }
}

// --- Elegibilidade ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Full,
    NoSessions,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Full => "full",
            BlockReason::NoSessions => "no-sessions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Book,
    Cancel,
    Blocked(BlockReason),
}

impl Eligibility {
    pub fn action(&self) -> &'static str {
        match self {
            Eligibility::Book => "book",
            Eligibility::Cancel => "cancel",
            Eligibility::Blocked(_) => "blocked",
        }
    }

    pub fn reason(&self) -> Option<BlockReason> {
        match self {
            Eligibility::Blocked(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// O que o subject pode fazer neste horário. Cancelar não depende de
/// capacidade nem de sessões; sem sessões tem precedência sobre lotado.
pub fn eligibility(slot: &Slot, subject: &Subject) -> Eligibility {
    if slot.is_booked_by(&subject.id) {
        return Eligibility::Cancel;
    }
    if subject.remaining_sessions() <= 0 {
        return Eligibility::Blocked(BlockReason::NoSessions);
    }
    if slot.is_full() {
        return Eligibility::Blocked(BlockReason::Full);
    }
    Eligibility::Book
}

// --- Alertas da assinatura ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionAlerts {
    pub low_sessions: bool,
    pub expiring: bool,
    pub exhausted: bool,
}

pub fn compute_alerts(subject: &Subject, now: NaiveDateTime) -> SubscriptionAlerts {
    let remaining = subject.raw_remaining();
    let expiring = subject
        .end_date
        .as_deref()
        .and_then(parse_end_date)
        .map(|end| days_until(now, end) <= EXPIRY_WARNING_DAYS)
        .unwrap_or(false);

    SubscriptionAlerts {
        // Igualdade exata: com 0 restantes vale o alerta de esgotado
        low_sessions: remaining == 1,
        expiring,
        exhausted: remaining <= 0,
    }
}

/// Aceita "YYYY-MM-DD" (meia-noite) ou RFC 3339 (convertido para hora local).
fn parse_end_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => d.and_hms_opt(0, 0, 0),
        Err(e) => {
            tracing::debug!("Data de fim ilegível '{}': {}", raw, e);
            None
        }
    }
}

/// Dias inteiros entre `now` e `end`, arredondados para cima.
fn days_until(now: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let diff: TimeDelta = end - now;
    let ms = diff.num_milliseconds();
    (ms + DAY_MS - 1).div_euclid(DAY_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subject::Role;

    fn slot(id: &str, date: &str, time: &str, max: u32, booked: &[&str]) -> Slot {
        Slot {
            id: id.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            max_clients: max,
            booked_clients: booked.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn subject(id: &str, total: i64, used: i64, end_date: Option<&str>) -> Subject {
        Subject {
            id: id.to_string(),
            full_name: "Teste".to_string(),
            email: "t@t.io".to_string(),
            role: Role::Client,
            total_sessions: total,
            used_sessions: used,
            start_date: None,
            end_date: end_date.map(str::to_string),
            admin_id: None,
            subscription_type: None,
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn empty_input_gives_empty_groups() {
        let out = derive_upcoming_groups(&[], at("2025-01-01 00:00"));
        assert!(out.is_empty());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn excludes_past_and_keeps_now() {
        let now = at("2025-03-01 10:00");
        let slots = vec![
            slot("past", "2025-03-01", "09:59", 2, &[]),
            slot("exact", "2025-03-01", "10:00", 2, &[]),
            slot("later", "2025-03-02", "08:00", 2, &[]),
        ];
        let out = derive_upcoming_groups(&slots, now);
        let ids: Vec<&str> = out
            .groups
            .iter()
            .flat_map(|g| g.slots.iter().map(|s| s.id.as_str()))
            .collect();
        assert_eq!(ids, vec!["exact", "later"]);
    }

    #[test]
    fn groups_are_chronological_and_sorted_within() {
        let now = at("2025-01-01 00:00");
        let slots = vec![
            slot("d", "2025-03-02", "09:00", 1, &[]),
            slot("b", "2025-03-01", "12:00", 1, &[]),
            slot("a", "2025-03-01", "08:00", 1, &[]),
            slot("c", "2025-02-28", "23:00", 1, &[]),
        ];
        let out = derive_upcoming_groups(&slots, now);
        let dates: Vec<&str> = out.available_dates();
        assert_eq!(dates, vec!["2025-02-28", "2025-03-01", "2025-03-02"]);
        let march_first: Vec<&str> = out
            .group("2025-03-01")
            .unwrap()
            .slots
            .iter()
            .map(|s| s.time.as_str())
            .collect();
        assert_eq!(march_first, vec!["08:00", "12:00"]);
    }

    #[test]
    fn ties_broken_by_id() {
        let now = at("2025-01-01 00:00");
        let slots = vec![
            slot("z", "2025-03-01", "10:00", 1, &[]),
            slot("m", "2025-03-01", "10:00", 1, &[]),
        ];
        let out = derive_upcoming_groups(&slots, now);
        let ids: Vec<&str> = out.groups[0].slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["m", "z"]);
    }

    #[test]
    fn derivation_is_idempotent() {
        let now = at("2025-03-01 09:00");
        let slots = vec![
            slot("1", "2025-03-03", "10:00", 2, &[]),
            slot("2", "2025-03-01", "11:00", 2, &["x"]),
            slot("3", "2025-02-01", "11:00", 2, &[]),
        ];
        assert_eq!(
            derive_upcoming_groups(&slots, now),
            derive_upcoming_groups(&slots, now)
        );
    }

    #[test]
    fn malformed_slot_is_skipped_with_warning() {
        let now = at("2025-01-01 00:00");
        let slots = vec![
            slot("bad-date", "01/03/2025", "10:00", 1, &[]),
            slot("bad-time", "2025-03-01", "25:99", 1, &[]),
            slot("ok", "2025-03-01", "10:00:00", 1, &[]),
        ];
        let out = derive_upcoming_groups(&slots, now);
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.groups[0].slots[0].id, "ok");
        let skipped: Vec<&str> = out.warnings.iter().map(|w| w.slot_id.as_str()).collect();
        assert_eq!(skipped, vec!["bad-date", "bad-time"]);
    }

    #[test]
    fn bookable_when_open_and_sessions_left() {
        let s = slot("s1", "2025-03-01", "10:00", 2, &[]);
        let who = subject("c", 10, 7, None);
        assert_eq!(eligibility(&s, &who), Eligibility::Book);
        assert_eq!(eligibility(&s, &who).reason(), None);
    }

    #[test]
    fn cancel_wins_even_without_sessions() {
        let s = slot("s1", "2025-03-01", "10:00", 2, &["c"]);
        let who = subject("c", 10, 10, None);
        assert_eq!(eligibility(&s, &who), Eligibility::Cancel);
    }

    #[test]
    fn cancel_wins_even_when_over_capacity() {
        let s = slot("s1", "2025-03-01", "10:00", 1, &["a", "c"]);
        let who = subject("c", 10, 2, None);
        assert_eq!(eligibility(&s, &who).action(), "cancel");
    }

    #[test]
    fn full_slot_is_blocked() {
        let s = slot("s1", "2025-03-01", "10:00", 2, &["a", "b"]);
        let who = subject("c", 10, 2, None);
        let verdict = eligibility(&s, &who);
        assert_eq!(verdict, Eligibility::Blocked(BlockReason::Full));
        assert_eq!(verdict.action(), "blocked");
        assert_eq!(verdict.reason().map(|r| r.as_str()), Some("full"));
    }

    #[test]
    fn no_sessions_is_blocked_and_takes_precedence() {
        let open = slot("s1", "2025-03-01", "10:00", 2, &[]);
        let full = slot("s2", "2025-03-01", "11:00", 1, &["a"]);
        let who = subject("c", 5, 5, None);
        assert_eq!(
            eligibility(&open, &who),
            Eligibility::Blocked(BlockReason::NoSessions)
        );
        assert_eq!(
            eligibility(&full, &who),
            Eligibility::Blocked(BlockReason::NoSessions)
        );
    }

    #[test]
    fn low_sessions_is_exact_equality() {
        let now = at("2025-03-01 10:00");
        let one_left = compute_alerts(&subject("c", 10, 9, None), now);
        assert!(one_left.low_sessions);
        assert!(!one_left.exhausted);

        let none_left = compute_alerts(&subject("c", 10, 10, None), now);
        assert!(none_left.exhausted);
        assert!(!none_left.low_sessions);

        let overdrawn = compute_alerts(&subject("c", 10, 12, None), now);
        assert!(overdrawn.exhausted);
    }

    #[test]
    fn expiring_alert_window() {
        let now = at("2025-03-01 10:00");
        let soon = compute_alerts(&subject("c", 10, 0, Some("2025-03-06")), now);
        assert!(soon.expiring);
        let far = compute_alerts(&subject("c", 10, 0, Some("2025-03-31")), now);
        assert!(!far.expiring);
        let none = compute_alerts(&subject("c", 10, 0, None), now);
        assert!(!none.expiring);
        let junk = compute_alerts(&subject("c", 10, 0, Some("soon")), now);
        assert!(!junk.expiring);
    }

    #[test]
    fn expiry_uses_ceiling_days() {
        let now = at("2025-03-01 10:00");
        // 7 dias e 14 horas -> 8 dias
        let end = at("2025-03-09 00:00");
        assert_eq!(days_until(now, end), 8);
        // Já expirado: diferença negativa continua <= 7
        let expired = compute_alerts(&subject("c", 10, 0, Some("2025-02-01")), now);
        assert!(expired.expiring);
    }

    #[test]
    fn alerts_are_independent() {
        let now = at("2025-03-01 10:00");
        let alerts = compute_alerts(&subject("c", 3, 2, Some("2025-03-02")), now);
        assert!(alerts.low_sessions && alerts.expiring);
        assert!(!alerts.exhausted);
    }
}
