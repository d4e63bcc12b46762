mod cli;
mod commands;
mod setup;

use clap::Parser;
use cli::{Cli, Command, CountersCommand, SessionCommand, VoteCommand, WalletCommand};
use commands::*;
use rally_storage::Member;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let db = cli.database_url.as_deref();
    let config = cli.config.as_deref();

    match cli.command {
        Command::Session { session_cmd } => match session_cmd {
            SessionCommand::Show { slot } => cmd_session_show(db, config, slot).await?,
            SessionCommand::List { week } => cmd_session_list(db, config, week).await?,
        },
        Command::Vote { vote_cmd } => match vote_cmd {
            VoteCommand::Cast {
                slot,
                member,
                name,
                email,
                waitlist,
            } => {
                let member = Member::new(member, name, email);
                cmd_vote_cast(db, config, slot, member, waitlist).await?
            }
            VoteCommand::Withdraw { slot, member } => {
                cmd_vote_withdraw(db, config, slot, &member).await?
            }
            VoteCommand::History { member, limit } => {
                cmd_vote_history(db, config, &member, limit).await?
            }
        },
        Command::Wallet { wallet_cmd } => match wallet_cmd {
            WalletCommand::Show { member } => cmd_wallet_show(db, config, &member).await?,
            WalletCommand::Set { member, cents } => {
                cmd_wallet_set(db, config, &member, cents).await?
            }
        },
        Command::Counters { counters_cmd } => match counters_cmd {
            CountersCommand::Check { slot } => cmd_counters_check(db, config, slot).await?,
            CountersCommand::Repair { slot } => cmd_counters_repair(db, config, slot).await?,
        },
    }

    Ok(())
}
