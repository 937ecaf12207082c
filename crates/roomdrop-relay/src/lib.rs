//! roomdrop-relay: signaling coordinator for browser-to-browser file drops.
//!
//! Clients join a room over WebSocket. The relay decides who offers and
//! who answers, admits answerers into a bounded number of concurrent
//! pairings in join order, and forwards negotiation messages between
//! paired peers. File bytes never pass through it.

pub mod connection;
pub mod manager;
pub mod protocol;
pub mod room;
pub mod server;
pub mod store;
