//! Application layer: session lifecycle and dependency wiring.

mod session;

pub use session::Session;
