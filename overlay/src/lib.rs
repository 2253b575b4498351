//! The SKIP+ overlay and its DHT layer: prefix algebra, the self-organizing
//! neighborhood (`SkipNode`), key ownership and lookup (`HashNode`), the RPC
//! listener dispatching against a running node, and the bootstrap/CLI glue
//! tying them together into a process.
pub mod algebra;
pub mod dht;
pub mod errors;
pub mod factory;
pub mod protocol;
pub mod skip;
