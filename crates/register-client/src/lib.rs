//! Client coordinator of the shared register service.
//!
//! The coordinator fans every operation out to all replica nodes in
//! parallel and aggregates the replies into a quorum decision. Reads
//! additionally heal trailing or failed replicas by forcing them forward
//! to the highest observed version ("read repair"). Writes run in two
//! phases, pre-commit then confirm, each of which must independently
//! reach quorum.

pub mod server;

use register::{ConfirmRequest, ReadResponse, UpdateRequest, ValueVersion, WriteRequest};
use std::time::Duration;

/// Fixed per-replica request timeout.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("quorum not met: {got} of {need} required replicas responded, try again later")]
    QuorumNotMet { got: usize, need: usize },
    #[error("invalid replica endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("replica returned {status}: {body}")]
    Replica {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Orchestrates quorum reads, two-phase quorum writes, and read repair
/// across a fixed set of replica endpoints.
pub struct Coordinator {
    id: uuid::Uuid,
    quorum: usize,
    replicas: Vec<url::Url>,
    http: reqwest::Client,
}

impl Coordinator {
    /// A Coordinator over `total_nodes` replicas listening on contiguous
    /// localhost ports starting at `first_node_port`.
    pub fn new(total_nodes: usize, first_node_port: u16) -> Self {
        let replicas = (0..total_nodes)
            .map(|index| {
                format!("http://127.0.0.1:{}", first_node_port as usize + index)
                    .parse()
                    .expect("localhost endpoint is a valid URL")
            })
            .collect();
        Self::with_endpoints(replicas)
    }

    /// A Coordinator over an explicit set of replica endpoints.
    pub fn with_endpoints(replicas: Vec<url::Url>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            quorum: replicas.len() / 2 + 1,
            http: reqwest::Client::builder()
                .timeout(RPC_TIMEOUT)
                .build()
                .expect("building the HTTP client does not fail"),
            replicas,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Read the register at `addr` from a quorum of replicas.
    ///
    /// The winning reply is the valid one with the highest version, ties
    /// broken by replica order. Failed and trailing replicas are repaired
    /// with the winner before returning; repair failures are logged and
    /// never fail the read.
    #[tracing::instrument(skip(self), err(level = tracing::Level::WARN))]
    pub async fn read(&self, addr: &str) -> Result<ValueVersion, Error> {
        let replies = futures::future::join_all(
            self.replicas
                .iter()
                .map(|endpoint| self.read_replica(endpoint, addr)),
        )
        .await;

        let mut valid = 0;
        let mut winner: Option<ValueVersion> = None;
        for (endpoint, reply) in self.replicas.iter().zip(&replies) {
            match reply {
                Ok(response) if response.should_include => {
                    valid += 1;
                    if winner
                        .as_ref()
                        .map_or(true, |w| response.value_version.version > w.version)
                    {
                        winner = Some(response.value_version.clone());
                    }
                }
                // The replica is not in this address's replica set; it
                // neither counts toward quorum nor gets repaired.
                Ok(_) => (),
                Err(error) => tracing::warn!(%endpoint, %error, "replica read failed"),
            }
        }
        if valid < self.quorum {
            return Err(Error::QuorumNotMet {
                got: valid,
                need: self.quorum,
            });
        }
        let winner = winner.expect("a met quorum implies at least one valid reply");

        // Read repair: force failed replicas and stale valid replicas
        // forward to the winning (value, version).
        let stale: Vec<&url::Url> = self
            .replicas
            .iter()
            .zip(&replies)
            .filter(|(_, reply)| match reply {
                Ok(response) => {
                    response.should_include && response.value_version.version != winner.version
                }
                Err(_) => true,
            })
            .map(|(endpoint, _)| endpoint)
            .collect();

        let outcomes = futures::future::join_all(
            stale
                .iter()
                .map(|endpoint| self.update_replica(endpoint, addr, &winner)),
        )
        .await;
        for (endpoint, outcome) in stale.iter().zip(outcomes) {
            if let Err(error) = outcome {
                tracing::warn!(%endpoint, %error, "read repair failed");
            }
        }

        Ok(winner)
    }

    /// Write `value` to the register at `addr` in two phases.
    ///
    /// Phase 1 pre-commits on every replica and requires a quorum of
    /// acks from replicas that hold the address; phase 2 then confirms
    /// and again requires quorum. A phase-2 shortfall leaves pending
    /// values behind on some replicas, which block further writes to the
    /// address until they expire.
    #[tracing::instrument(skip(self, value), err(level = tracing::Level::WARN))]
    pub async fn write(&self, addr: &str, value: &str) -> Result<(), Error> {
        let replies = futures::future::join_all(
            self.replicas
                .iter()
                .map(|endpoint| self.write_replica(endpoint, addr, value)),
        )
        .await;

        let mut accepted = 0;
        for (endpoint, reply) in self.replicas.iter().zip(&replies) {
            match reply {
                Ok(ack) if ack.should_include => accepted += 1,
                Ok(_) => (),
                Err(error) => tracing::warn!(%endpoint, %error, "replica pre-commit failed"),
            }
        }
        if accepted < self.quorum {
            return Err(Error::QuorumNotMet {
                got: accepted,
                need: self.quorum,
            });
        }

        // Confirm on every replica, not only the phase-1 ackers: a
        // replica which accepted the pre-commit but misses its confirm
        // sheds the pending value once it expires.
        let replies = futures::future::join_all(
            self.replicas
                .iter()
                .map(|endpoint| self.confirm_replica(endpoint, addr)),
        )
        .await;

        let mut confirmed = 0;
        for (endpoint, reply) in self.replicas.iter().zip(&replies) {
            match reply {
                Ok(()) => confirmed += 1,
                Err(error) => tracing::warn!(%endpoint, %error, "replica confirm failed"),
            }
        }
        if confirmed < self.quorum {
            return Err(Error::QuorumNotMet {
                got: confirmed,
                need: self.quorum,
            });
        }
        Ok(())
    }

    async fn read_replica(&self, endpoint: &url::Url, addr: &str) -> Result<ReadResponse, Error> {
        let response = self
            .http
            .get(endpoint.join("read")?)
            .query(&[("address", addr)])
            .send()
            .await?;
        Ok(expect_ok(response).await?.json().await?)
    }

    async fn write_replica(
        &self,
        endpoint: &url::Url,
        addr: &str,
        value: &str,
    ) -> Result<register::WriteResponse, Error> {
        let request = WriteRequest {
            address: addr.to_string(),
            value: value.to_string(),
        };
        let response = self
            .http
            .post(endpoint.join("write")?)
            .json(&request)
            .send()
            .await?;
        Ok(expect_ok(response).await?.json().await?)
    }

    async fn confirm_replica(&self, endpoint: &url::Url, addr: &str) -> Result<(), Error> {
        let request = ConfirmRequest {
            address: addr.to_string(),
        };
        let response = self
            .http
            .put(endpoint.join("confirm")?)
            .json(&request)
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }

    async fn update_replica(
        &self,
        endpoint: &url::Url,
        addr: &str,
        winner: &ValueVersion,
    ) -> Result<(), Error> {
        let request = UpdateRequest {
            address: addr.to_string(),
            value: winner.value.clone(),
            version: winner.version,
        };
        let response = self
            .http
            .put(endpoint.join("update")?)
            .json(&request)
            .send()
            .await?;
        expect_ok(response).await?;
        Ok(())
    }
}

// Map a non-2xx reply into Error::Replica with its plaintext body.
async fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Replica {
            status,
            body: response.text().await?,
        })
    }
}
