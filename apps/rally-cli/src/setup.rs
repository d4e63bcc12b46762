use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rally_config::{ClubConfig, ConfigError};
use rally_store_sqlite::SqliteStore;
use rally_voting::VotingService;
use std::path::Path;
use std::sync::Arc;

pub type Service = VotingService<SqliteStore, SqliteStore>;

/// Explicit path must exist; otherwise fall back from ~/.rally/club.json to defaults.
pub fn load_config(path: Option<&Path>) -> Result<ClubConfig, ConfigError> {
    match path {
        Some(path) => ClubConfig::load_from(path),
        None => match ClubConfig::load() {
            Err(ConfigError::NotFound) => Ok(ClubConfig::default()),
            other => other,
        },
    }
}

pub async fn setup_service(
    database_url: Option<&str>,
    config_path: Option<&Path>,
) -> Result<(Arc<SqliteStore>, Service), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let store = match database_url {
        Some(url) => SqliteStore::open(url).await?,
        None => SqliteStore::open_default().await?,
    };
    let store = Arc::new(store);
    tracing::debug!(?database_url, timezone = %config.timezone, "Opened club database");
    let service = VotingService::new(&config, store.clone(), store.clone());
    Ok((store, service))
}

pub fn format_local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%a %Y-%m-%d %H:%M").to_string()
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, cents.abs() / 100, cents.abs() % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_local() {
        let at = Utc.with_ymd_and_hms(2026, 10, 23, 0, 0, 0).unwrap();
        assert_eq!(
            format_local(at, chrono_tz::America::Toronto),
            "Thu 2026-10-22 20:00"
        );
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5_000), "$50.00");
        assert_eq!(format_cents(1_205), "$12.05");
        assert_eq!(format_cents(-75), "-$0.75");
    }

    #[tokio::test]
    async fn test_setup_service_opens_explicit_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("club.json");
        ClubConfig::default().save_to(&config).unwrap();
        let url = format!("sqlite://{}", dir.path().join("club.db").to_string_lossy());

        let (_, service) = setup_service(Some(&url), Some(&config)).await.unwrap();
        assert_eq!(service.schedule().timezone(), chrono_tz::America::Toronto);
        assert!(dir.path().join("club.db").exists());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("club.json");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::NotFound)
        ));

        ClubConfig::default().save_to(&missing).unwrap();
        assert_eq!(load_config(Some(&missing)).unwrap(), ClubConfig::default());
    }
}
