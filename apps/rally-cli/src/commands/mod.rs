pub mod counters;
pub mod session;
pub mod vote;
pub mod wallet;

pub use counters::{cmd_counters_check, cmd_counters_repair};
pub use session::{cmd_session_list, cmd_session_show};
pub use vote::{cmd_vote_cast, cmd_vote_history, cmd_vote_withdraw};
pub use wallet::{cmd_wallet_set, cmd_wallet_show};
