//! Cluster-level collaborators that do not go through the database session:
//!
//! - `role`: asks a peer node for its replication role over HTTP
//! - `restart`: runs the fixed restart command and classifies its exit

pub mod restart;
pub mod role;

pub use restart::{
    CommandRunner, ExitReport, ProcessRunner, RestartError, RestartTrigger, RESTART_ARGS,
    RESTART_PROGRAM, RESTART_SUCCESS_MESSAGE,
};
pub use role::{
    PeerRoleProber, ProbeError, RoleProbe, RoleProbeResult, MAX_CONNECT_TIMEOUT, ROLE_REPORT_PATH,
    ROLE_REPORT_PORT,
};
