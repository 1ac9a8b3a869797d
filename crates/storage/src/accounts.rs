//! Driver accounts and sleep log

use crate::store::{KeyValueStore, Mapping};
use crate::StorageError;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Sleep log timestamp format
pub const RECORDED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Username {0} already exists")]
    UsernameTaken(String),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Unknown user {0}")]
    UnknownUser(String),
    #[error("Invalid clock hour: {0}")]
    InvalidHour(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// Whole hour on a 12-hour clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockHour {
    hour: u8,
    meridiem: Meridiem,
}

impl ClockHour {
    pub fn new(hour: u8, meridiem: Meridiem) -> Result<Self, AccountError> {
        if !(1..=12).contains(&hour) {
            return Err(AccountError::InvalidHour(format!("{} is not in 1..=12", hour)));
        }
        Ok(Self { hour, meridiem })
    }

    /// Hour of the day, 0..24
    pub fn to_24h(self) -> u8 {
        match (self.hour, self.meridiem) {
            (12, Meridiem::Am) => 0,
            (12, Meridiem::Pm) => 12,
            (h, Meridiem::Am) => h,
            (h, Meridiem::Pm) => h + 12,
        }
    }

    /// Hours from `self` to `wake`, wrapping past midnight when `wake` is earlier
    pub fn hours_until(self, wake: ClockHour) -> f64 {
        let sleep = f64::from(self.to_24h());
        let mut wake = f64::from(wake.to_24h());
        if wake < sleep {
            wake += 24.0;
        }
        wake - sleep
    }
}

impl fmt::Display for ClockHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let period = match self.meridiem {
            Meridiem::Am => "AM",
            Meridiem::Pm => "PM",
        };
        write!(f, "{:02} {}", self.hour, period)
    }
}

impl FromStr for ClockHour {
    type Err = AccountError;

    /// Parses "11 PM", "07am"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| AccountError::InvalidHour(s.to_string()))?;
        let (hour, period) = s.split_at(split);
        let hour: u8 = hour
            .parse()
            .map_err(|_| AccountError::InvalidHour(s.to_string()))?;
        let meridiem = match period.trim().to_ascii_uppercase().as_str() {
            "AM" => Meridiem::Am,
            "PM" => Meridiem::Pm,
            _ => return Err(AccountError::InvalidHour(s.to_string())),
        };
        ClockHour::new(hour, meridiem)
    }
}

/// One sleep log entry, stored as `[hours, recorded_at]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SleepEntry", into = "(f64, String)")]
pub struct SleepRecord {
    pub hours: f64,
    /// Empty for legacy entries that only stored hours
    pub recorded_at: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SleepEntry {
    Pair(f64, String),
    Hours(f64),
}

impl From<SleepEntry> for SleepRecord {
    fn from(entry: SleepEntry) -> Self {
        match entry {
            SleepEntry::Pair(hours, recorded_at) => Self { hours, recorded_at },
            SleepEntry::Hours(hours) => Self {
                hours,
                recorded_at: String::new(),
            },
        }
    }
}

impl From<SleepRecord> for (f64, String) {
    fn from(record: SleepRecord) -> Self {
        (record.hours, record.recorded_at)
    }
}

fn password_digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Credentials and sleep logs over two key-value stores
pub struct AccountBook<S: KeyValueStore> {
    users: S,
    sleep: S,
}

impl<S: KeyValueStore> AccountBook<S> {
    pub fn new(users: S, sleep: S) -> Self {
        Self { users, sleep }
    }

    pub fn create_account(&self, username: &str, password: &str, confirm: &str) -> Result<(), AccountError> {
        let mut users = self.users.load()?;
        if users.contains_key(username) {
            warn!("Account creation rejected: {} exists", username);
            return Err(AccountError::UsernameTaken(username.to_string()));
        }
        if password != confirm {
            return Err(AccountError::PasswordMismatch);
        }

        users.insert(username.to_string(), Value::String(password_digest(password)));
        self.users.save(&users)?;

        let mut sleep = self.sleep.load()?;
        sleep.insert(username.to_string(), Value::Array(Vec::new()));
        self.sleep.save(&sleep)?;

        info!("Account created: {}", username);
        Ok(())
    }

    pub fn login(&self, username: &str, password: &str) -> Result<(), AccountError> {
        let users = self.users.load()?;
        let digest = password_digest(password);
        match users.get(username).and_then(Value::as_str) {
            Some(stored) if stored == digest => {}
            _ => {
                warn!("Login failed for {}", username);
                return Err(AccountError::InvalidCredentials);
            }
        }

        let mut sleep = self.sleep.load()?;
        if !sleep.contains_key(username) {
            sleep.insert(username.to_string(), Value::Array(Vec::new()));
            self.sleep.save(&sleep)?;
        }

        info!("Logged in: {}", username);
        Ok(())
    }

    /// Append a sleep entry stamped with the local time
    pub fn record_sleep(&self, username: &str, sleep: ClockHour, wake: ClockHour) -> Result<SleepRecord, AccountError> {
        self.record_sleep_at(username, sleep, wake, Local::now().naive_local())
    }

    pub fn record_sleep_at(
        &self,
        username: &str,
        sleep: ClockHour,
        wake: ClockHour,
        now: NaiveDateTime,
    ) -> Result<SleepRecord, AccountError> {
        if !self.users.load()?.contains_key(username) {
            return Err(AccountError::UnknownUser(username.to_string()));
        }

        let record = SleepRecord {
            hours: sleep.hours_until(wake),
            recorded_at: now.format(RECORDED_AT_FORMAT).to_string(),
        };

        let mut log = self.sleep.load()?;
        let mut history = history_of(&log, username)?;
        history.push(record.clone());
        log.insert(username.to_string(), to_value(&history)?);
        self.sleep.save(&log)?;

        info!("{} slept from {} to {} ({:.2} hours)", username, sleep, wake, record.hours);
        Ok(record)
    }

    pub fn sleep_history(&self, username: &str) -> Result<Vec<SleepRecord>, AccountError> {
        let log = self.sleep.load()?;
        if !log.contains_key(username) && !self.users.load()?.contains_key(username) {
            return Err(AccountError::UnknownUser(username.to_string()));
        }
        history_of(&log, username)
    }
}

fn history_of(log: &Mapping, username: &str) -> Result<Vec<SleepRecord>, AccountError> {
    match log.get(username) {
        Some(value) => Ok(serde_json::from_value(value.clone()).map_err(StorageError::from)?),
        None => Ok(Vec::new()),
    }
}

fn to_value(history: &[SleepRecord]) -> Result<Value, AccountError> {
    Ok(serde_json::to_value(history).map_err(StorageError::from)?)
}
