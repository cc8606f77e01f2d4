// Interface adapters: wire protocol, network handling and the physics engine binding.

pub mod net;
pub mod physics;
pub mod protocol;
pub mod state;
