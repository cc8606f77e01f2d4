// Network adapter modules for client sockets.

pub mod client;

pub use client::ws_handler;
