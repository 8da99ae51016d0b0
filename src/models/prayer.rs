use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerType {
    Fajr,
    Zuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerType {
    pub fn all() -> Vec<PrayerType> {
        vec![
            PrayerType::Fajr,
            PrayerType::Zuhr,
            PrayerType::Asr,
            PrayerType::Maghrib,
            PrayerType::Isha,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerType::Fajr => "fajr",
            PrayerType::Zuhr => "zuhr",
            PrayerType::Asr => "asr",
            PrayerType::Maghrib => "maghrib",
            PrayerType::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerType::Fajr => "Fajr",
            PrayerType::Zuhr => "Dhuhr",
            PrayerType::Asr => "Asr",
            PrayerType::Maghrib => "Maghrib",
            PrayerType::Isha => "Isha",
        }
    }

    pub fn arabic_label(&self) -> &'static str {
        match self {
            PrayerType::Fajr => "الفجر",
            PrayerType::Zuhr => "الظهر",
            PrayerType::Asr => "العصر",
            PrayerType::Maghrib => "المغرب",
            PrayerType::Isha => "العشاء",
        }
    }
}

impl std::fmt::Display for PrayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fajr" => Ok(PrayerType::Fajr),
            "zuhr" | "dhuhr" | "dhuhur" => Ok(PrayerType::Zuhr),
            "asr" => Ok(PrayerType::Asr),
            "maghrib" => Ok(PrayerType::Maghrib),
            "isha" => Ok(PrayerType::Isha),
            _ => Err(anyhow::anyhow!("Unknown prayer type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerStatus {
    Pending,
    Done,
    Missed,
}

impl PrayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerStatus::Pending => "pending",
            PrayerStatus::Done => "done",
            PrayerStatus::Missed => "missed",
        }
    }

    /// Done and missed both count as handled; only pending still wants a nudge.
    pub fn is_handled(&self) -> bool {
        !matches!(self, PrayerStatus::Pending)
    }
}

impl FromStr for PrayerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PrayerStatus::Pending),
            "done" => Ok(PrayerStatus::Done),
            "missed" => Ok(PrayerStatus::Missed),
            _ => Err(anyhow::anyhow!("Unknown prayer status: {}", s)),
        }
    }
}

/// A stored prayer row for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prayer {
    pub id: Option<i64>,
    pub prayer_type: PrayerType,
    pub date: String,
    pub status: PrayerStatus,
}

/// One of today's five prayers with its local start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTime {
    pub prayer_type: PrayerType,
    pub time: NaiveTime,
    pub arabic_label: String,
}

impl PrayerTime {
    pub fn new(prayer_type: PrayerType, time: NaiveTime) -> Self {
        Self {
            prayer_type,
            time,
            arabic_label: prayer_type.arabic_label().to_string(),
        }
    }
}

/// Which of today's prayers the user has already dealt with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSnapshot {
    handled: HashMap<PrayerType, bool>,
}

impl CompletionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_prayers(prayers: &[Prayer]) -> Self {
        let handled = prayers
            .iter()
            .map(|p| (p.prayer_type, p.status.is_handled()))
            .collect();
        Self { handled }
    }

    pub fn with(mut self, prayer_type: PrayerType, handled: bool) -> Self {
        self.handled.insert(prayer_type, handled);
        self
    }

    /// Prayers with no entry read as not handled.
    pub fn is_handled(&self, prayer_type: PrayerType) -> bool {
        self.handled.get(&prayer_type).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(prayer_type: PrayerType, status: PrayerStatus) -> Prayer {
        Prayer {
            id: None,
            prayer_type,
            date: "2026-10-16".to_string(),
            status,
        }
    }

    #[test]
    fn parses_dhuhr_spellings() {
        for s in ["zuhr", "Dhuhr", "DHUHUR"] {
            assert_eq!(PrayerType::from_str(s).unwrap(), PrayerType::Zuhr);
        }
        assert!(PrayerType::from_str("tahajjud").is_err());
    }

    #[test]
    fn missed_counts_as_handled() {
        let snapshot = CompletionSnapshot::from_prayers(&[
            row(PrayerType::Fajr, PrayerStatus::Missed),
            row(PrayerType::Zuhr, PrayerStatus::Done),
            row(PrayerType::Asr, PrayerStatus::Pending),
        ]);
        assert!(snapshot.is_handled(PrayerType::Fajr));
        assert!(snapshot.is_handled(PrayerType::Zuhr));
        assert!(!snapshot.is_handled(PrayerType::Asr));
        assert!(!snapshot.is_handled(PrayerType::Isha));
    }

    #[test]
    fn prayer_time_carries_arabic_label() {
        let p = PrayerTime::new(PrayerType::Maghrib, NaiveTime::from_hms_opt(19, 45, 0).unwrap());
        assert_eq!(p.arabic_label, "المغرب");
    }
}
