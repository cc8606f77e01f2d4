// Physics engine adapters for the domain physics port.

pub mod rapier;

pub use rapier::RapierPhysics;
