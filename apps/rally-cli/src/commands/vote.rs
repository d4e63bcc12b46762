use rally_storage::{ListKind, Member, MemberId, SlotKey};
use std::path::Path;

use crate::setup::{format_local, setup_service};

pub async fn cmd_vote_cast(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    slot: SlotKey,
    member: Member,
    waitlist: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, service) = setup_service(database_url, config_path).await?;

    let list = if waitlist {
        ListKind::Waitlist
    } else {
        ListKind::Main
    };
    let session = service.current_session(slot).await?;
    let entry = service.cast_vote(&session.id, &member, list).await?;

    println!(
        "✓ {} is on the {} list for {} (#{})",
        entry.member.name, entry.list, slot, entry.cast_seq
    );
    Ok(())
}

pub async fn cmd_vote_withdraw(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    slot: SlotKey,
    member_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, service) = setup_service(database_url, config_path).await?;

    let session = service.current_session(slot).await?;
    let outcome = service
        .withdraw_vote(&session.id, &MemberId::new(member_id))
        .await?;

    println!(
        "✓ Withdrew {} from the {} list for {}",
        outcome.removed.member.name, outcome.removed.list, slot
    );
    if let Some(promoted) = outcome.promoted {
        println!(
            "  {} moved from the waitlist to the main list",
            promoted.member.name
        );
    }
    Ok(())
}

pub async fn cmd_vote_history(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    member_id: &str,
    limit: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, service) = setup_service(database_url, config_path).await?;
    let tz = service.schedule().timezone();

    let history = service
        .member_history(&MemberId::new(member_id), limit)
        .await?;

    if history.is_empty() {
        println!("No votes found.");
    } else {
        println!("Votes:");
        for vote in history {
            println!(
                "  {:<9} {}  {}",
                vote.slot,
                format_local(vote.play_at, tz),
                vote.vote.list
            );
        }
    }
    Ok(())
}
