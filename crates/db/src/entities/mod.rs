//! Database entities.

#![allow(missing_docs)]

pub mod choice;
pub mod next_poll;
pub mod poll;
pub mod vote;

pub use choice::Entity as Choice;
pub use next_poll::Entity as NextPoll;
pub use poll::{Entity as Poll, PollKind};
pub use vote::Entity as Vote;
