use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rally_storage::SlotKey;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rally")]
#[command(about = "Club session voting administration")]
pub struct Cli {
    /// Database URL (defaults to ~/.rally/rally.db)
    #[arg(long, env = "RALLY_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Club config file (defaults to ~/.rally/club.json, then built-in defaults)
    #[arg(long, env = "RALLY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Session commands
    Session {
        #[command(subcommand)]
        session_cmd: SessionCommand,
    },
    /// Vote commands
    Vote {
        #[command(subcommand)]
        vote_cmd: VoteCommand,
    },
    /// Member wallet commands
    Wallet {
        #[command(subcommand)]
        wallet_cmd: WalletCommand,
    },
    /// Capacity counter maintenance
    Counters {
        #[command(subcommand)]
        counters_cmd: CountersCommand,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Show this week's session for a slot with both lists
    Show {
        /// Slot (wednesday, thursday, saturday, sunday)
        slot: SlotKey,
    },
    /// List sessions of a week
    List {
        /// Any date in the week (YYYY-MM-DD, defaults to the current voting week)
        #[arg(long)]
        week: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum VoteCommand {
    /// Cast a vote on behalf of a member
    Cast {
        slot: SlotKey,
        /// Member ID
        #[arg(long)]
        member: String,
        /// Display name
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Join the waitlist instead of the main list
        #[arg(long)]
        waitlist: bool,
    },
    /// Withdraw a member's vote
    Withdraw {
        slot: SlotKey,
        /// Member ID
        #[arg(long)]
        member: String,
    },
    /// Show a member's voting history
    History {
        /// Member ID
        #[arg(long)]
        member: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Subcommand)]
pub enum WalletCommand {
    /// Show a member's balance
    Show {
        /// Member ID
        member: String,
    },
    /// Overwrite a member's balance
    Set {
        /// Member ID
        member: String,
        /// Balance in cents
        #[arg(allow_negative_numbers = true)]
        cents: i64,
    },
}

#[derive(Subcommand)]
pub enum CountersCommand {
    /// Compare stored counters with the vote ledger
    Check { slot: SlotKey },
    /// Rewrite stored counters from the vote ledger
    Repair { slot: SlotKey },
}
