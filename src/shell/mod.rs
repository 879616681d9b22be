//! Interactive Shell Module
//!
//! Line-oriented command surface over a `String`-valued cache, used by the
//! binary.

mod command;
mod handlers;

pub use command::Command;
pub use handlers::execute;
