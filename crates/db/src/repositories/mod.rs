//! Database repositories.

mod poll;

pub use poll::{PollRepository, is_serialization_failure, map_db_err};
