use chrono::NaiveTime;
use chrono_tz::Tz;
use rally_storage::SlotKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Club config file not found")]
    NotFound,
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine home directory")]
    NoHomeDir,
    #[error("Slot '{0}' is not configured")]
    MissingSlot(SlotKey),
    #[error("Slot '{0}' must have a capacity of at least 1")]
    ZeroCapacity(SlotKey),
    #[error("Minimum balance must not be negative (got {0} cents)")]
    NegativeMinBalance(i64),
}

/// Club-wide voting configuration stored in ~/.rally/club.json
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClubConfig {
    /// IANA zone all weekday/time-of-day rules are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    /// Balance a member needs to cast a vote, in cents.
    #[serde(default = "default_min_balance_cents")]
    pub min_balance_cents: i64,
    /// How many times a mutation is re-run after losing a race on its session.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    #[serde(default)]
    pub window: WindowConfig,
    pub slots: BTreeMap<SlotKey, SlotConfig>,
}

/// Weekly voting window boundaries (local times)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Voting opens on the week's Monday at this time.
    #[serde(with = "hhmm", default = "default_opens_at")]
    pub opens_at: NaiveTime,
    /// Voting closes at this time on the session's own day.
    #[serde(with = "hhmm", default = "default_closes_at")]
    pub closes_at: NaiveTime,
}

/// Per-slot play time and main-list capacity
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotConfig {
    #[serde(with = "hhmm")]
    pub play_time: NaiveTime,
    pub capacity: u32,
}

fn default_timezone() -> Tz {
    chrono_tz::America::Toronto
}

fn default_min_balance_cents() -> i64 {
    5_000
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_opens_at() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_closes_at() -> NaiveTime {
    NaiveTime::from_hms_opt(11, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn slot(hour: u32, minute: u32, capacity: u32) -> SlotConfig {
    SlotConfig {
        play_time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN),
        capacity,
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            opens_at: default_opens_at(),
            closes_at: default_closes_at(),
        }
    }
}

impl Default for ClubConfig {
    fn default() -> Self {
        let slots = BTreeMap::from([
            (SlotKey::Wednesday, slot(20, 0, 36)),
            (SlotKey::Thursday, slot(20, 0, 20)),
            (SlotKey::Saturday, slot(6, 0, 46)),
            (SlotKey::Sunday, slot(7, 0, 22)),
        ]);
        Self {
            timezone: default_timezone(),
            min_balance_cents: default_min_balance_cents(),
            max_conflict_retries: default_max_conflict_retries(),
            window: WindowConfig::default(),
            slots,
        }
    }
}

impl ClubConfig {
    /// Load config from default path (~/.rally/club.json)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path()?)
    }

    /// Load and validate config from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound
            } else {
                ConfigError::Read(e)
            }
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to custom path
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self)?)?;
        Ok(())
    }

    /// Get default config path (~/.rally/club.json)
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::home_dir()
            .ok_or(ConfigError::NoHomeDir)?
            .join(".rally")
            .join("club.json"))
    }

    /// Every slot must be configured with a usable capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_balance_cents < 0 {
            return Err(ConfigError::NegativeMinBalance(self.min_balance_cents));
        }
        for key in SlotKey::ALL {
            let slot = self.slot(key)?;
            if slot.capacity == 0 {
                return Err(ConfigError::ZeroCapacity(key));
            }
        }
        Ok(())
    }

    /// Get the configuration of one slot
    pub fn slot(&self, key: SlotKey) -> Result<&SlotConfig, ConfigError> {
        self.slots.get(&key).ok_or(ConfigError::MissingSlot(key))
    }
}

/// `"HH:MM"` encoding for local times of day.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}
