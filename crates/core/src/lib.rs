//! Core business logic for pollchain.
//!
//! [`VoteEngine`] turns a ballot into exactly one committed voting event or a
//! typed rejection. [`PollChainManager`] spawns and walks successor polls.
//! [`PollService`] is the inbound facade that puts deadlines around both.

pub mod services;

pub use services::*;
