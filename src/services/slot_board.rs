// src/services/slot_board.rs
// Quadro de gestão de horários do admin: grelha de horas, hoje, próximos, passados.
use crate::{
    models::slot::Slot,
    services::availability::{slot_timestamp, DateGroup},
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::collections::BTreeMap;

// Grelha do dia: 10:00 até 21:40, de 20 em 20 minutos
const FIRST_HOUR: u32 = 10;
const LAST_HOUR_EXCLUSIVE: u32 = 22;
const STEP_MINUTES: i64 = 20;

/// Uma célula da grelha de criação de horários.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourCell {
    pub time: String,
    pub taken: bool,
    pub disabled: bool,
}

pub fn day_times() -> Vec<String> {
    let mut times = Vec::new();
    let Some(mut t) = NaiveTime::from_hms_opt(FIRST_HOUR, 0, 0) else {
        return times;
    };
    let end = NaiveTime::from_hms_opt(LAST_HOUR_EXCLUSIVE, 0, 0);
    while Some(t) < end {
        times.push(t.format("%H:%M").to_string());
        t += TimeDelta::minutes(STEP_MINUTES);
    }
    times
}

/// Grelha para a data escolhida. Uma hora fica bloqueada se já houver horário
/// nela ou, sendo hoje, se já tiver passado (inclui o minuto atual).
/// Compara instantes, não texto: "10:00:00" ocupa a célula das 10:00.
pub fn hour_grid(slots: &[Slot], date: &str, now: NaiveDateTime) -> Vec<HourCell> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok();
    let occupied: Vec<NaiveDateTime> = slots.iter().filter_map(|s| slot_timestamp(s).ok()).collect();
    let current = now.format("%H:%M").to_string();
    let is_today = day == Some(now.date());

    day_times()
        .into_iter()
        .map(|time| {
            let cell_at = day.zip(NaiveTime::parse_from_str(&time, "%H:%M").ok()).map(|(d, t)| d.and_time(t));
            let taken = cell_at.is_some_and(|at| occupied.contains(&at));
            let past = is_today && time <= current;
            HourCell {
                disabled: taken || past,
                taken,
                time,
            }
        })
        .collect()
}

/// Horários agrupados para o painel do admin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotBoard {
    pub today: Vec<Slot>,
    pub upcoming: Vec<DateGroup>,
    pub past: Vec<DateGroup>,
}

impl SlotBoard {
    /// Hoje; depois datas futuras (crescente); depois passadas (decrescente).
    pub fn build(slots: &[Slot], today: NaiveDate) -> Self {
        let today_key = today.format("%Y-%m-%d").to_string();
        let mut by_date: BTreeMap<String, Vec<Slot>> = BTreeMap::new();
        for slot in slots {
            by_date.entry(slot.date.clone()).or_default().push(slot.clone());
        }

        let mut board = SlotBoard::default();
        for (date, mut day) in by_date {
            day.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
            if date == today_key {
                board.today = day;
            } else if date > today_key {
                board.upcoming.push(DateGroup { date, slots: day });
            } else {
                board.past.push(DateGroup { date, slots: day });
            }
        }
        board.past.reverse();
        board
    }
}

/// Só se editam horários que ainda não passaram; datas ilegíveis não se editam.
pub fn is_editable(slot: &Slot, now: NaiveDateTime) -> bool {
    slot_timestamp(slot).map(|ts| ts >= now).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: &str, date: &str, time: &str) -> Slot {
        Slot {
            id: id.into(),
            date: date.into(),
            time: time.into(),
            max_clients: 1,
            booked_clients: vec![],
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn day_grid_spans_ten_to_twenty_one_forty() {
        let times = day_times();
        assert_eq!(times.len(), 36);
        assert_eq!(times.first().map(String::as_str), Some("10:00"));
        assert_eq!(times.last().map(String::as_str), Some("21:40"));
    }

    #[test]
    fn grid_blocks_taken_and_elapsed_hours() {
        let slots = vec![slot("a", "2025-03-01", "15:00")];
        let grid = hour_grid(&slots, "2025-03-01", at("2025-03-01 10:20"));
        let cell = |t: &str| grid.iter().find(|c| c.time == t).unwrap().clone();
        assert!(cell("10:00").disabled);
        assert!(cell("10:20").disabled);
        assert!(!cell("10:40").disabled);
        assert!(cell("15:00").taken && cell("15:00").disabled);

        let tomorrow = hour_grid(&slots, "2025-03-02", at("2025-03-01 23:00"));
        assert!(tomorrow.iter().all(|c| !c.disabled));
    }

    #[test]
    fn grid_matches_times_with_seconds() {
        let slots = vec![slot("a", "2025-03-02", "10:00:00"), slot("b", "2025-03-02", " 11:20")];
        let grid = hour_grid(&slots, "2025-03-02", at("2025-03-01 09:00"));
        let taken: Vec<&str> = grid.iter().filter(|c| c.taken).map(|c| c.time.as_str()).collect();
        assert_eq!(taken, vec!["10:00", "11:20"]);
    }

    #[test]
    fn board_splits_today_upcoming_and_past() {
        let slots = vec![
            slot("p1", "2025-02-01", "10:00"),
            slot("p2", "2025-02-20", "10:00"),
            slot("t2", "2025-03-01", "12:00"),
            slot("t1", "2025-03-01", "10:00"),
            slot("u2", "2025-03-10", "10:00"),
            slot("u1", "2025-03-05", "10:00"),
        ];
        let board = SlotBoard::build(&slots, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        let today: Vec<&str> = board.today.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(today, vec!["t1", "t2"]);
        let upcoming: Vec<&str> = board.upcoming.iter().map(|g| g.date.as_str()).collect();
        assert_eq!(upcoming, vec!["2025-03-05", "2025-03-10"]);
        let past: Vec<&str> = board.past.iter().map(|g| g.date.as_str()).collect();
        assert_eq!(past, vec!["2025-02-20", "2025-02-01"]);
    }

    #[test]
    fn only_future_slots_are_editable() {
        let now = at("2025-03-01 12:00");
        assert!(is_editable(&slot("a", "2025-03-01", "12:00"), now));
        assert!(!is_editable(&slot("b", "2025-03-01", "11:40"), now));
        assert!(!is_editable(&slot("c", "garbage", "11:40"), now));
    }
}
