use rally_storage::{BalanceService, MemberId};
use std::path::Path;

use crate::setup::{format_cents, setup_service};

pub async fn cmd_wallet_show(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    member_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (store, _) = setup_service(database_url, config_path).await?;
    let balance = store.get_balance_cents(&MemberId::new(member_id)).await?;
    println!("{}: {}", member_id, format_cents(balance));
    Ok(())
}

pub async fn cmd_wallet_set(
    database_url: Option<&str>,
    config_path: Option<&Path>,
    member_id: &str,
    cents: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let (store, _) = setup_service(database_url, config_path).await?;
    store
        .set_balance_cents(&MemberId::new(member_id), cents)
        .await?;
    tracing::info!(member_id, cents, "Wallet balance set");
    println!("✓ {} balance set to {}", member_id, format_cents(cents));
    Ok(())
}
