//! Business logic services.

pub mod chain;
pub mod poll;
pub mod vote;

pub use chain::{PollChainManager, derive_successor};
pub use poll::{CreatePollInput, Deadlines, PollService, PollStatus, PollView, VoteReceipt};
pub use vote::VoteEngine;
