use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BusError;
use crate::transport::Transport;

/// Messaging configuration shared by every role binary.
///
/// Parsed from `cardwatch.toml`; all fields have local IPC defaults so a
/// missing or partial file still yields a runnable single-host setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Broker socket endpoints.
    #[serde(default)]
    pub broker: BrokerEndpoints,

    /// Job pipeline endpoint (scheduler PUSH → worker PULL).
    #[serde(default)]
    pub jobs: JobsEndpoint,
}

/// Broker section of `cardwatch.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEndpoints {
    /// Where publishers connect (broker binds its SUB socket here).
    #[serde(default = "default_frontend")]
    pub frontend: Transport,

    /// Where subscribers connect (broker binds its PUB socket here).
    #[serde(default = "default_backend")]
    pub backend: Transport,

    /// Liveness probe endpoint (REP socket).
    #[serde(default = "default_health")]
    pub health: Transport,
}

/// Jobs section of `cardwatch.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsEndpoint {
    /// PUSH/PULL endpoint for the distributed job queue. The scheduler
    /// binds the PUSH side; worker processes connect PULL sockets and
    /// get round-robin delivery.
    #[serde(default = "default_jobs")]
    pub endpoint: Transport,

    /// Return path for re-delivery: workers PUSH jobs they could not
    /// finish (shutdown mid-job) and the scheduler forwards them back
    /// into the main pipeline.
    #[serde(default = "default_jobs_requeue")]
    pub requeue: Transport,
}

fn default_frontend() -> Transport {
    Transport::ipc("broker-frontend")
}

fn default_backend() -> Transport {
    Transport::ipc("broker-backend")
}

fn default_health() -> Transport {
    Transport::ipc("broker-health")
}

fn default_jobs() -> Transport {
    Transport::ipc("jobs")
}

fn default_jobs_requeue() -> Transport {
    Transport::ipc("jobs-requeue")
}

impl Default for BrokerEndpoints {
    fn default() -> Self {
        Self {
            frontend: default_frontend(),
            backend: default_backend(),
            health: default_health(),
        }
    }
}

impl Default for JobsEndpoint {
    fn default() -> Self {
        Self {
            endpoint: default_jobs(),
            requeue: default_jobs_requeue(),
        }
    }
}

impl BusConfig {
    /// Local single-host defaults (IPC sockets under `/tmp/cardwatch/`).
    pub fn local() -> Self {
        Self {
            broker: BrokerEndpoints::default(),
            jobs: JobsEndpoint::default(),
        }
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_local_defaults() {
        let cfg: BusConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.broker.frontend, Transport::ipc("broker-frontend"));
        assert_eq!(cfg.jobs.endpoint, Transport::ipc("jobs"));
    }

    #[test]
    fn tcp_endpoints_parse() {
        let cfg: BusConfig = toml::from_str(
            r#"
            [broker]
            frontend = { type = "tcp", address = { host = "10.0.0.5", port = 5560 } }
            backend = { type = "tcp", address = { host = "10.0.0.5", port = 5561 } }
            health = { type = "tcp", address = { host = "10.0.0.5", port = 5562 } }

            [jobs]
            endpoint = { type = "tcp", address = { host = "10.0.0.5", port = 5563 } }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.broker.frontend.endpoint(), "tcp://10.0.0.5:5560");
        assert_eq!(cfg.jobs.endpoint.endpoint(), "tcp://10.0.0.5:5563");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: BusConfig = toml::from_str(
            r#"
            [broker]
            frontend = { type = "ipc", address = "custom-frontend" }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.broker.frontend, Transport::ipc("custom-frontend"));
        assert_eq!(cfg.broker.backend, Transport::ipc("broker-backend"));
    }
}
