// Use cases layer: session workflows for the arena server.

pub mod game;
pub mod session;
pub mod throttle;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use game::{SessionManager, SessionSettings, session_task, simulation_task};
pub use session::GameSession;
pub use throttle::LogThrottle;
pub use types::{ClientCommand, ControlEvent, InboundMessage, OutboundEvent};
