//! Peer role probing
//!
//! Every node serves its replication role at `GET http://[<addr>]:5500/flycheck/role`
//! as a JSON-quoted string (`"primary"\n`). [`PeerRoleProber`] fetches and
//! normalizes it.

use async_trait::async_trait;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

/// Port of the role-report endpoint on every node
pub const ROLE_REPORT_PORT: u16 = 5500;

/// Path of the role-report endpoint
pub const ROLE_REPORT_PATH: &str = "/flycheck/role";

/// Upper bound for establishing the TCP connection to a peer
pub const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Normalized replication role token reported by a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleProbeResult(String);

impl RoleProbeResult {
    /// Normalize a raw role-report body.
    ///
    /// Strips one trailing newline, then exactly one layer of surrounding double quotes,
    /// and lowercases what remains.
    pub fn from_body(body: &str) -> Self {
        let token = body.strip_suffix('\n').unwrap_or(body);
        let token = token.strip_suffix('\r').unwrap_or(token);
        let token = token
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(token);
        RoleProbeResult(token.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RoleProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while probing a peer, classified by cause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The request never produced a response (refused, unreachable, timed out)
    Connect { endpoint: String, message: String },
    /// The peer answered with a non-200 status
    Status { endpoint: String, status: u16 },
    /// The response body could not be read or carried no role
    Decode { endpoint: String, message: String },
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Connect { endpoint, message } => {
                write!(f, "role check failed: cannot reach {}: {}", endpoint, message)
            }
            ProbeError::Status { endpoint, status } => {
                write!(f, "role check failed: {} returned status {}", endpoint, status)
            }
            ProbeError::Decode { endpoint, message } => {
                write!(f, "role check failed: invalid response from {}: {}", endpoint, message)
            }
        }
    }
}

impl std::error::Error for ProbeError {}

/// Asks a peer node for its replication role.
#[async_trait]
pub trait RoleProbe: Send + Sync {
    async fn probe(&self, address: IpAddr) -> Result<RoleProbeResult, ProbeError>;
}

/// HTTP prober for the role-report endpoint
#[derive(Clone)]
pub struct PeerRoleProber {
    agent: ureq::Agent,
    port: u16,
    connect_timeout: Duration,
}

impl PeerRoleProber {
    /// Create a prober for the well-known role-report port
    pub fn new(timeout: Duration) -> Self {
        Self::with_port(ROLE_REPORT_PORT, timeout)
    }

    /// Create a prober against a non-standard port.
    ///
    /// `timeout` bounds the whole probe; connecting is additionally capped at
    /// [`MAX_CONNECT_TIMEOUT`] so an abandoned probe to a dead peer ends early.
    pub fn with_port(port: u16, timeout: Duration) -> Self {
        let connect_timeout = timeout.min(MAX_CONNECT_TIMEOUT);
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .timeout_connect(Some(connect_timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            port,
            connect_timeout,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Role-report URL for `address`
    pub fn endpoint(&self, address: IpAddr) -> String {
        match address {
            IpAddr::V6(v6) => format!("http://[{}]:{}{}", v6, self.port, ROLE_REPORT_PATH),
            IpAddr::V4(v4) => format!("http://{}:{}{}", v4, self.port, ROLE_REPORT_PATH),
        }
    }

    fn probe_blocking(agent: &ureq::Agent, endpoint: String) -> Result<RoleProbeResult, ProbeError> {
        // A transport failure returns here, before any response is inspected.
        let mut response = match agent.get(&endpoint).call() {
            Ok(response) => response,
            Err(e) => {
                return Err(ProbeError::Connect {
                    endpoint,
                    message: e.to_string(),
                })
            }
        };

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ProbeError::Status { endpoint, status });
        }

        let body = match response.body_mut().read_to_string() {
            Ok(body) => body,
            Err(e) => {
                return Err(ProbeError::Decode {
                    endpoint,
                    message: e.to_string(),
                })
            }
        };

        let role = RoleProbeResult::from_body(&body);
        if role.as_str().trim().is_empty() {
            return Err(ProbeError::Decode {
                endpoint,
                message: "empty role".to_string(),
            });
        }
        Ok(role)
    }
}

#[async_trait]
impl RoleProbe for PeerRoleProber {
    async fn probe(&self, address: IpAddr) -> Result<RoleProbeResult, ProbeError> {
        let endpoint = self.endpoint(address);
        tracing::debug!("probing peer role at {}", endpoint);

        let agent = self.agent.clone();
        let task_endpoint = endpoint.clone();
        // ureq blocks; the probe is bounded by the agent's global timeout.
        tokio::task::spawn_blocking(move || Self::probe_blocking(&agent, task_endpoint))
            .await
            .map_err(|e| ProbeError::Connect {
                endpoint,
                message: format!("probe task failed: {}", e),
            })?
    }
}
