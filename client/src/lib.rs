//! A minimal client for speaking the SKIP+ wire protocol to a single remote
//! peer: open (or reuse) a pooled TCP connection, send one of the five
//! declared RPC methods, and get back a typed result or a structured error.
//!
//! ## Pooling
//!
//! `PeerConnManager` implements `deadpool::managed::Manager`, so a
//! `PeerClient` is backed by a `deadpool` pool capped at one live
//! connection per peer. `registry::client_for` is the process-wide entry
//! point most callers want: it caches one such pool per `(host, port)` so
//! repeated calls to the same peer reuse the same socket.
//!
//! ```ignore
//! use skipplus_client::registry;
//! use skipplus_types::wire::Method;
//!
//! let client = registry::client_for("127.0.0.1", 4001);
//! let rs = client.get_rs().await?;
//! ```
pub mod conn;
pub mod error;
pub mod registry;
pub mod transport;
