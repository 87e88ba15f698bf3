//! Shared building blocks: constants, lock helpers and the event bus.

mod constants;
mod event_bus;
mod util;

pub use constants::*;
pub use event_bus::*;
pub use util::*;
