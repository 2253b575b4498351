use crate::bincode::BinCodeSerAndDeser;
use crate::node::BitString;
use crate::node::NodeRef;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;

/// A DHT entry. `value` is unused (left empty) for lookup/delete requests;
/// only `insert` populates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SearchOp {
    Lookup,
    Insert,
    Delete,
}

/// The five declared remote methods of the core (spec.md §4.2), carried as
/// a closed enum so the dispatch table in `overlay::protocol` is exhaustive
/// and statically checked rather than reflection-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Method {
    GetRs,
    Linearise(NodeRef),
    Search { entry: Entry, op: SearchOp },
    HandOff(NodeRef),
    TakeOver(HashMap<String, String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MethodResult {
    Rs(BitString),
    Unit,
    SearchResult(Option<String>),
    HandOffMap(HashMap<String, String>),
}

/// The structured error shape spec.md §6 requires responses to carry on
/// failure: `{kind, message}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: String,
    pub message: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RemoteError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcRequest {
    pub correlation_id: u64,
    pub method: Method,
}

impl<'a> BinCodeSerAndDeser<'a> for RpcRequest {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcResponse {
    pub correlation_id: u64,
    pub result: Result<MethodResult, RemoteError>,
}

impl<'a> BinCodeSerAndDeser<'a> for RpcResponse {}
