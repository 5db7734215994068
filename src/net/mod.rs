//! Networking Layer
//!
//! Everything that touches a file descriptor lives here:
//!
//! - `listener`: the non-blocking accepting socket
//! - `connection`: per-client buffers, interest flags, read/write drivers
//! - `event_loop`: the epoll multiplexer with its one timer slot
//!
//! All three are mechanism, not policy — the server module decides what
//! readiness means.

pub mod connection;
pub mod event_loop;
pub mod listener;

pub use connection::Connection;
pub use event_loop::{EventLoop, Poll, Readiness};
pub use listener::Listener;
