use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use rally_storage::{SlotKey, VoteEntry};
use rally_voting::WindowStatus;
use std::path::Path;

use crate::setup::{format_local, setup_service};

pub async fn cmd_session_show(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    slot: SlotKey,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, service) = setup_service(database_url, config_path).await?;
    let tz = service.schedule().timezone();

    let session = service.current_session(slot).await?;
    let roster = service.roster(&session.id).await?;

    println!("Session: {} {}", slot, format_local(session.play_at, tz));
    println!("  ID: {}", session.id.0);
    println!("  Voting: {}", describe_window(&roster.window, service.now(), tz));
    println!(
        "  Main list: {}/{}",
        roster.session.main_count, roster.session.capacity
    );
    print_entries(&roster.main, tz);
    println!("  Waitlist: {}", roster.session.waitlist_count);
    print_entries(&roster.waitlist, tz);

    Ok(())
}

/// One-line window summary with a countdown while voting is open.
fn describe_window(status: &WindowStatus, now: DateTime<Utc>, tz: Tz) -> String {
    let boundary = match status {
        WindowStatus::NotYetOpen { opens_at } => format!("opens {}", format_local(*opens_at, tz)),
        WindowStatus::Open { closes_at } => format!("closes {}", format_local(*closes_at, tz)),
        WindowStatus::Closed { closed_at } => format!("since {}", format_local(*closed_at, tz)),
    };
    match status.time_remaining(now) {
        Some(left) => format!(
            "{} ({}, {} left)",
            status.reason(),
            boundary,
            format_countdown(left)
        ),
        None => format!("{} ({})", status.reason(), boundary),
    }
}

fn format_countdown(left: Duration) -> String {
    let minutes = left.num_minutes();
    let (days, hours, minutes) = (minutes / 1440, minutes % 1440 / 60, minutes % 60);
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn print_entries(entries: &[VoteEntry], tz: Tz) {
    for (i, entry) in entries.iter().enumerate() {
        let promoted = match entry.promoted_at {
            Some(at) => format!(", promoted {}", format_local(at, tz)),
            None => String::new(),
        };
        println!(
            "    {:>2}. {} <{}> (voted {}{})",
            i + 1,
            entry.member.name,
            entry.member.email,
            format_local(entry.cast_at, tz),
            promoted
        );
    }
}

pub async fn cmd_session_list(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    week: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, service) = setup_service(database_url, config_path).await?;
    let tz = service.schedule().timezone();

    let week = match week {
        Some(date) => date,
        None => service.current_week()?.week_of,
    };
    let sessions = service.list_sessions(week).await?;

    if sessions.is_empty() {
        println!("No sessions for the week of {}.", week);
    } else {
        println!("Sessions:");
        for session in sessions {
            println!(
                "  {:<9} {}  main {}/{}  waitlist {}",
                session.slot,
                format_local(session.play_at, tz),
                session.main_count,
                session.capacity,
                session.waitlist_count
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Toronto;

    fn local(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Toronto
            .with_ymd_and_hms(2026, 10, d, h, mi, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_open_window_shows_countdown() {
        let status = WindowStatus::Open {
            closes_at: local(22, 11, 0),
        };
        assert_eq!(
            describe_window(&status, local(20, 9, 15), Toronto),
            "open (closes Thu 2026-10-22 11:00, 2d 1h 45m left)"
        );
        assert_eq!(
            describe_window(&status, local(22, 10, 20), Toronto),
            "open (closes Thu 2026-10-22 11:00, 40m left)"
        );
    }

    #[test]
    fn test_closed_and_pending_windows_have_no_countdown() {
        let closed = WindowStatus::Closed {
            closed_at: local(22, 11, 0),
        };
        assert_eq!(
            describe_window(&closed, local(22, 12, 0), Toronto),
            "closed (since Thu 2026-10-22 11:00)"
        );

        let pending = WindowStatus::NotYetOpen {
            opens_at: local(26, 18, 0),
        };
        assert_eq!(
            describe_window(&pending, local(22, 12, 0), Toronto),
            "not yet open (opens Mon 2026-10-26 18:00)"
        );
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::minutes(59)), "59m");
        assert_eq!(format_countdown(Duration::minutes(61)), "1h 1m");
        assert_eq!(format_countdown(Duration::hours(49)), "2d 1h 0m");
    }
}
