use rally_storage::SlotKey;
use std::path::Path;

use crate::setup::setup_service;

pub async fn cmd_counters_check(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    slot: SlotKey,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, service) = setup_service(database_url, config_path).await?;

    let session = service.current_session(slot).await?;
    let check = service.verify_counters(&session.id).await?;

    println!(
        "Stored: main {}, waitlist {}",
        check.stored.main, check.stored.waitlist
    );
    println!(
        "Ledger: main {}, waitlist {}",
        check.ledger.main, check.ledger.waitlist
    );
    if check.is_consistent() {
        println!("✓ Counters match the ledger");
        Ok(())
    } else {
        Err(format!("counters for {} drifted, run `rally counters repair {}`", slot, slot).into())
    }
}

pub async fn cmd_counters_repair(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    slot: SlotKey,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, service) = setup_service(database_url, config_path).await?;

    let session = service.current_session(slot).await?;
    let repaired = service.repair_counters(&session.id).await?;

    println!(
        "✓ Counters for {}: main {}/{}, waitlist {}",
        slot, repaired.main_count, repaired.capacity, repaired.waitlist_count
    );
    Ok(())
}
