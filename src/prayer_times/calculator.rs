use anyhow::{anyhow, Result};
use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use salah::prelude::*;

use crate::config::SalahConfig;
use crate::db::repository::{CacheRepo, CachedTimes};
use crate::models::{PrayerTime, PrayerType};

#[derive(Debug, Clone)]
pub struct PrayerTimesLocal {
    pub fajr: NaiveTime,
    pub sunrise: NaiveTime,
    pub zuhr: NaiveTime,
    pub asr: NaiveTime,
    pub maghrib: NaiveTime,
    pub isha: NaiveTime,
}

impl PrayerTimesLocal {
    /// The five obligatory prayers in order; sunrise is not one of them.
    pub fn prayers(&self) -> Vec<PrayerTime> {
        vec![
            PrayerTime::new(PrayerType::Fajr, self.fajr),
            PrayerTime::new(PrayerType::Zuhr, self.zuhr),
            PrayerTime::new(PrayerType::Asr, self.asr),
            PrayerTime::new(PrayerType::Maghrib, self.maghrib),
            PrayerTime::new(PrayerType::Isha, self.isha),
        ]
    }
}

impl From<CachedTimes> for PrayerTimesLocal {
    fn from(cached: CachedTimes) -> Self {
        Self {
            fajr: cached.fajr,
            sunrise: cached.sunrise,
            zuhr: cached.zuhr,
            asr: cached.asr,
            maghrib: cached.maghrib,
            isha: cached.isha,
        }
    }
}

impl From<&PrayerTimesLocal> for CachedTimes {
    fn from(times: &PrayerTimesLocal) -> Self {
        Self {
            fajr: times.fajr,
            sunrise: times.sunrise,
            zuhr: times.zuhr,
            asr: times.asr,
            maghrib: times.maghrib,
            isha: times.isha,
        }
    }
}

pub struct PrayerCalculator {
    pub lat: f64,
    pub lng: f64,
    pub method_str: String,
    pub madhab_str: String,
    pub tz_offset_minutes: i32,
}

impl PrayerCalculator {
    pub fn new(
        lat: f64,
        lng: f64,
        method: &str,
        madhab: &str,
        tz_offset_minutes: i32,
    ) -> Result<Self> {
        // Validate method + madhab early
        parse_method(method)?;
        parse_madhab(madhab)?;
        Ok(Self {
            lat,
            lng,
            method_str: method.to_string(),
            madhab_str: madhab.to_string(),
            tz_offset_minutes,
        })
    }

    pub fn from_config(salah: &SalahConfig) -> Result<Self> {
        Self::new(
            salah.latitude,
            salah.longitude,
            &salah.calc_method,
            &salah.madhab,
            salah.timezone_offset,
        )
    }

    fn compute_times(&self, date: NaiveDate) -> Result<PrayerTimesLocal> {
        let coords = Coordinates::new(self.lat, self.lng);
        let method = parse_method(&self.method_str)?;
        let madhab = parse_madhab(&self.madhab_str)?;
        let params = Configuration::with(method, madhab);

        let times = PrayerSchedule::new()
            .on(date)
            .for_location(coords)
            .with_configuration(params)
            .calculate()
            .map_err(|e| anyhow!("Prayer calculation failed: {}", e))?;

        let offset = FixedOffset::east_opt(self.tz_offset_minutes * 60)
            .ok_or_else(|| anyhow!("Invalid timezone offset: {}", self.tz_offset_minutes))?;

        let to_local = |utc: chrono::DateTime<chrono::Utc>| -> NaiveTime {
            utc.with_timezone(&offset).time()
        };

        Ok(PrayerTimesLocal {
            fajr: to_local(times.time(Prayer::Fajr)),
            sunrise: to_local(times.time(Prayer::Sunrise)),
            zuhr: to_local(times.time(Prayer::Dhuhr)),
            asr: to_local(times.time(Prayer::Asr)),
            maghrib: to_local(times.time(Prayer::Maghrib)),
            isha: to_local(times.time(Prayer::Isha)),
        })
    }

    /// Ensure prayer_times_cache has entries for today through `days_ahead` days.
    pub fn ensure_cached(&self, conn: &Connection, today: NaiveDate, days_ahead: u32) -> Result<()> {
        for i in 0..=(days_ahead as i64) {
            let date = today + Duration::days(i);
            let date_str = date.format("%Y-%m-%d").to_string();

            if CacheRepo::get_times_for_date(conn, &date_str)?.is_none() {
                let times = self.compute_times(date)?;
                CacheRepo::store_times(conn, &date_str, &CachedTimes::from(&times))?;
            }
        }
        Ok(())
    }

    /// Get times from cache (or compute if missing) for a specific date.
    pub fn get_cached_or_compute(
        &self,
        conn: &Connection,
        date: NaiveDate,
    ) -> Result<PrayerTimesLocal> {
        let date_str = date.format("%Y-%m-%d").to_string();

        if let Some(cached) = CacheRepo::get_times_for_date(conn, &date_str)? {
            return Ok(cached.into());
        }

        let times = self.compute_times(date)?;
        CacheRepo::store_times(conn, &date_str, &CachedTimes::from(&times))?;
        Ok(times)
    }

    /// The day's five prayers, ascending.
    pub fn prayers_for(&self, conn: &Connection, date: NaiveDate) -> Result<Vec<PrayerTime>> {
        Ok(self.get_cached_or_compute(conn, date)?.prayers())
    }

    /// Returns (next PrayerType, seconds until it).
    pub fn get_next_prayer(
        &self,
        conn: &Connection,
        now: NaiveDateTime,
    ) -> Result<Option<(PrayerType, i64)>> {
        let today = now.date();
        for prayer in self.prayers_for(conn, today)? {
            if prayer.time > now.time() {
                let secs = (today.and_time(prayer.time) - now).num_seconds();
                return Ok(Some((prayer.prayer_type, secs)));
            }
        }

        // All prayers passed, next is Fajr tomorrow
        let Some(tomorrow) = today.succ_opt() else {
            return Ok(None);
        };
        let fajr = self.get_cached_or_compute(conn, tomorrow)?.fajr;
        let secs = (tomorrow.and_time(fajr) - now).num_seconds();
        Ok(Some((PrayerType::Fajr, secs)))
    }
}

fn parse_method(s: &str) -> Result<Method> {
    match s {
        "MuslimWorldLeague" => Ok(Method::MuslimWorldLeague),
        "Egyptian" => Ok(Method::Egyptian),
        "Karachi" => Ok(Method::Karachi),
        "UmmAlQura" => Ok(Method::UmmAlQura),
        "Dubai" => Ok(Method::Dubai),
        "MoonsightingCommittee" => Ok(Method::MoonsightingCommittee),
        "NorthAmerica" => Ok(Method::NorthAmerica),
        "Kuwait" => Ok(Method::Kuwait),
        "Qatar" => Ok(Method::Qatar),
        "Singapore" => Ok(Method::Singapore),
        "Tehran" => Ok(Method::Tehran),
        "Turkey" => Ok(Method::Turkey),
        "Other" => Ok(Method::Other),
        _ => Err(anyhow!("Unknown calculation method: '{}'", s)),
    }
}

fn parse_madhab(s: &str) -> Result<Madhab> {
    match s {
        "Hanafi" => Ok(Madhab::Hanafi),
        "Shafi" | "Shafi'i" => Ok(Madhab::Shafi),
        _ => Err(anyhow!("Unknown madhab: '{}'", s)),
    }
}
