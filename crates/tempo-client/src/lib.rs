//! Connection management and subscription routing for Tempo.
//!
//! This crate owns the client's **single live connection**. One actor task
//! holds the transport, the connection state machine, and the topic
//! handler table; everything else talks to it through a cheap-clone
//! [`ClientHandle`]. No other component ever holds the socket — that is
//! the discipline that keeps two components from racing to reconnect or
//! double-subscribing.
//!
//! ```text
//!                 ClientHandle (publish / subscribe / connect …)
//!                        │ mpsc commands, oneshot replies
//!                        ▼
//!  ┌──────────────── connection actor ────────────────┐
//!  │ ConnectionState machine    SubscriptionRouter    │
//!  │ backoff timer              heartbeat             │
//!  └───────┬──────────────────────────▲───────────────┘
//!          │ dial / send              │ (epoch, frame)
//!          ▼                          │
//!       Transport ──────────── reader task (one per connection)
//! ```
//!
//! Because every inbound frame, timer firing, and command is processed on
//! the actor task, no two topic handlers ever run concurrently and none
//! of the in-process state needs a lock.

mod backoff;
mod error;
mod manager;
mod router;
mod state;

pub use backoff::BackoffPolicy;
pub use error::ClientError;
pub use manager::{spawn, ClientConfig, ClientHandle};
pub use router::TopicHandler;
pub use state::{ConnectionState, Epoch};
