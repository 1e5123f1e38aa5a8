//! Shared types of the register protocol: the (value, version) pair held
//! at each address, the JSON bodies exchanged between the client
//! coordinator and replica nodes, and the ring-placement predicate.

mod ring;
pub use ring::{fnv1a, include_in_shard};

/// A register's payload together with its committed version.
///
/// Version 0 is a sentinel meaning "never committed": a record may exist
/// with version 0 while a pre-commit awaits confirmation, and reads treat
/// it as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ValueVersion {
    pub value: String,
    pub version: u64,
}

/// Body of `POST /write`: pre-commit `value` at `address`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRequest {
    pub address: String,
    pub value: String,
}

/// Body of `PUT /confirm`: commit the pending value at `address`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfirmRequest {
    pub address: String,
}

/// Body of `PUT /update`: force-adopt `(value, version)` at `address`,
/// bypassing the two-phase path. Issued by the coordinator's read repair.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateRequest {
    pub address: String,
    pub value: String,
    pub version: u64,
}

/// Reply of `GET /read` on a replica. `should_include` is the replica's
/// self-report of whether it is in the address's replica set; replies
/// with `should_include == false` do not count toward quorum.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReadResponse {
    pub value_version: ValueVersion,
    pub should_include: bool,
}

/// Reply of `POST /write` on a replica.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteResponse {
    pub should_include: bool,
}
