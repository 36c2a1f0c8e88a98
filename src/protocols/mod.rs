//! Protocol implementations.
//!
//! - `oneshot`: acknowledge, receive once, echo, close
pub mod oneshot;
