//! Évaluation du planning de régénération.
//!
//! [`is_due`] et [`next_due`] sont des fonctions pures : elles ne lisent ni
//! l'horloge ni la configuration. L'appelant enregistre la date de dernière
//! exécution seulement après un succès.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};

/// Jour d'ancrage des exécutions hebdomadaires
pub const ANCHOR_DAY: Weekday = Weekday::Mon;

/// Format persisté de la date de dernière exécution
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fréquence des régénérations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalKind {
    Hourly,
    #[default]
    Daily,
    Weekly,
}

impl IntervalKind {
    /// Code persisté (0 = horaire, 1 = quotidien, 2 = hebdomadaire)
    pub fn code(&self) -> u8 {
        match self {
            IntervalKind::Hourly => 0,
            IntervalKind::Daily => 1,
            IntervalKind::Weekly => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(IntervalKind::Hourly),
            1 => Some(IntervalKind::Daily),
            2 => Some(IntervalKind::Weekly),
            _ => None,
        }
    }
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntervalKind::Hourly => "hourly",
            IntervalKind::Daily => "daily",
            IntervalKind::Weekly => "weekly",
        })
    }
}

impl FromStr for IntervalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if let Ok(code) = s.parse::<i64>() {
            return IntervalKind::from_code(code).ok_or_else(|| format!("unknown interval code {code}"));
        }
        match s.as_str() {
            "hourly" => Ok(IntervalKind::Hourly),
            "daily" => Ok(IntervalKind::Daily),
            "weekly" => Ok(IntervalKind::Weekly),
            _ => Err(format!("unknown interval {s:?}")),
        }
    }
}

/// Heure de déclenchement `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    fn as_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    fn matches(&self, t: &NaiveDateTime) -> bool {
        t.hour() == self.hour && t.minute() == self.minute
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self { hour: 3, minute: 0 }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got {s:?}"))?;
        let hour = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
        let minute = m.trim().parse::<u32>().map_err(|e| e.to_string())?;
        TimeOfDay::new(hour, minute).ok_or_else(|| format!("time out of range: {s:?}"))
    }
}

/// État du planning tel que lu dans la configuration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulePolicy {
    pub enabled: bool,
    pub interval: IntervalKind,
    pub time: TimeOfDay,
    pub last_run: Option<NaiveDateTime>,
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

pub fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Vrai si une régénération doit avoir lieu à `now`.
///
/// - horaire : jamais exécuté, ou au moins une heure écoulée ;
/// - quotidien : `now` tombe dans la minute `time` et la dernière exécution
///   date d'un jour antérieur ;
/// - hebdomadaire : comme quotidien, un lundi, et au moins 7 jours écoulés.
pub fn is_due(
    now: NaiveDateTime,
    last_run: Option<NaiveDateTime>,
    kind: IntervalKind,
    time: TimeOfDay,
) -> bool {
    match kind {
        IntervalKind::Hourly => last_run.is_none_or(|last| now - last >= Duration::hours(1)),
        IntervalKind::Daily => {
            time.matches(&now) && last_run.is_none_or(|last| last.date() < now.date())
        }
        IntervalKind::Weekly => {
            time.matches(&now)
                && now.weekday() == ANCHOR_DAY
                && last_run.is_none_or(|last| now - last >= Duration::days(7))
        }
    }
}

/// Premier instant `>= now` pour lequel [`is_due`] est vrai.
///
/// Retourne `None` si aucun instant ne convient dans les deux semaines à
/// venir (date de dernière exécution dans le futur, par exemple).
pub fn next_due(
    now: NaiveDateTime,
    last_run: Option<NaiveDateTime>,
    kind: IntervalKind,
    time: TimeOfDay,
) -> Option<NaiveDateTime> {
    if kind == IntervalKind::Hourly {
        return Some(match last_run {
            Some(last) => now.max(last + Duration::hours(1)),
            None => now,
        });
    }

    for offset in 0..=14 {
        let day = now.date() + Duration::days(offset);
        let window_start = day.and_time(time.as_time());
        let window_end = window_start + Duration::minutes(1);
        if window_end <= now {
            continue;
        }

        let mut candidate = window_start.max(now);
        if kind == IntervalKind::Weekly {
            if let Some(last) = last_run {
                candidate = candidate.max(last + Duration::days(7));
            }
        }
        if candidate < window_end && is_due(candidate, last_run, kind, time) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    // 2024-01-01 est un lundi
    const Y: i32 = 2024;

    #[test]
    fn test_hourly() {
        let now = at(Y, 1, 3, 12, 0, 0);
        let t = TimeOfDay::default();
        assert!(is_due(now, None, IntervalKind::Hourly, t));
        assert!(!is_due(now, Some(now - Duration::minutes(59)), IntervalKind::Hourly, t));
        assert!(is_due(now, Some(now - Duration::minutes(61)), IntervalKind::Hourly, t));
        assert!(is_due(now, Some(now - Duration::minutes(60)), IntervalKind::Hourly, t));
    }

    #[test]
    fn test_daily() {
        let t = TimeOfDay::new(3, 0).unwrap();
        let now = at(Y, 1, 3, 3, 0, 30);
        assert!(is_due(now, None, IntervalKind::Daily, t));
        assert!(is_due(now, Some(at(Y, 1, 2, 3, 0, 5)), IntervalKind::Daily, t));
        // Déjà exécuté aujourd'hui
        assert!(!is_due(now, Some(at(Y, 1, 3, 3, 0, 1)), IntervalKind::Daily, t));
        // Mauvaise minute
        assert!(!is_due(at(Y, 1, 3, 3, 1, 0), None, IntervalKind::Daily, t));
    }

    #[test]
    fn test_weekly() {
        let t = TimeOfDay::new(3, 0).unwrap();
        let monday = at(Y, 1, 8, 3, 0, 0);
        let tuesday = at(Y, 1, 9, 3, 0, 0);
        assert!(is_due(monday, None, IntervalKind::Weekly, t));
        assert!(!is_due(tuesday, None, IntervalKind::Weekly, t));
        assert!(is_due(monday, Some(at(Y, 1, 1, 3, 0, 0)), IntervalKind::Weekly, t));
        // Moins de 7 jours
        assert!(!is_due(monday, Some(at(Y, 1, 1, 3, 0, 10)), IntervalKind::Weekly, t));
        assert!(!is_due(monday, Some(at(Y, 1, 5, 3, 0, 0)), IntervalKind::Weekly, t));
    }

    #[test]
    fn test_next_due_hourly() {
        let now = at(Y, 1, 3, 12, 0, 0);
        let t = TimeOfDay::default();
        assert_eq!(next_due(now, None, IntervalKind::Hourly, t), Some(now));
        let last = now - Duration::minutes(20);
        assert_eq!(
            next_due(now, Some(last), IntervalKind::Hourly, t),
            Some(last + Duration::hours(1))
        );
    }

    #[test]
    fn test_next_due_daily() {
        let t = TimeOfDay::new(3, 0).unwrap();
        // Avant l'heure
        assert_eq!(
            next_due(at(Y, 1, 3, 1, 0, 0), None, IntervalKind::Daily, t),
            Some(at(Y, 1, 3, 3, 0, 0))
        );
        // Dans la minute
        assert_eq!(
            next_due(at(Y, 1, 3, 3, 0, 20), None, IntervalKind::Daily, t),
            Some(at(Y, 1, 3, 3, 0, 20))
        );
        // Déjà exécuté aujourd'hui : demain
        assert_eq!(
            next_due(
                at(Y, 1, 3, 3, 0, 20),
                Some(at(Y, 1, 3, 3, 0, 5)),
                IntervalKind::Daily,
                t
            ),
            Some(at(Y, 1, 4, 3, 0, 0))
        );
    }

    #[test]
    fn test_next_due_weekly() {
        let t = TimeOfDay::new(3, 0).unwrap();
        // Mercredi 3 janvier : prochain lundi le 8
        assert_eq!(
            next_due(at(Y, 1, 3, 10, 0, 0), None, IntervalKind::Weekly, t),
            Some(at(Y, 1, 8, 3, 0, 0))
        );
        // Dernière exécution lundi 1er à 03:00:30 : le 8 à 03:00:30
        assert_eq!(
            next_due(
                at(Y, 1, 3, 10, 0, 0),
                Some(at(Y, 1, 1, 3, 0, 30)),
                IntervalKind::Weekly,
                t
            ),
            Some(at(Y, 1, 8, 3, 0, 30))
        );
    }

    #[test]
    fn test_next_due_agrees_with_is_due() {
        let t = TimeOfDay::new(22, 15).unwrap();
        let now = at(Y, 2, 7, 23, 59, 59);
        for kind in [IntervalKind::Hourly, IntervalKind::Daily, IntervalKind::Weekly] {
            let last = Some(now - Duration::days(3));
            let due = next_due(now, last, kind, t).unwrap();
            assert!(due >= now);
            assert!(is_due(due, last, kind, t));
            // Aucun instant antérieur, à la minute près
            let before = due - Duration::minutes(1);
            if before >= now {
                assert!(!is_due(before, last, kind, t));
            }
        }
    }

    #[test]
    fn test_next_due_future_last_run() {
        let t = TimeOfDay::default();
        let now = at(Y, 1, 3, 10, 0, 0);
        assert_eq!(
            next_due(now, Some(now + Duration::days(30)), IntervalKind::Daily, t),
            None
        );
    }

    #[test]
    fn test_parsing() {
        assert_eq!("07:05".parse::<TimeOfDay>().unwrap().to_string(), "07:05");
        assert!("25:00".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
        assert_eq!("2".parse::<IntervalKind>().unwrap(), IntervalKind::Weekly);
        assert_eq!("Hourly".parse::<IntervalKind>().unwrap(), IntervalKind::Hourly);
        assert!("5".parse::<IntervalKind>().is_err());

        let ts = at(Y, 3, 4, 5, 6, 7);
        assert_eq!(format_timestamp(&ts), "2024-03-04 05:06:07");
        assert_eq!(parse_timestamp("2024-03-04 05:06:07"), Some(ts));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
