use thiserror::Error;

/// Errors raised while planning or applying a fabric bring-up.
///
/// "Already exists" is never an error: creation paths log it and continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZtpError {
    #[error("invalid supernet /{supernet} for /{cidr} block (expected 27, 28, 29 or 30 and not shorter than the block)")]
    InvalidSupernet { supernet: u8, cidr: u8 },

    #[error("address space exhausted: {0}")]
    AddressSpaceExhausted(String),

    #[error("control plane unreachable for switch {switch}: {reason}")]
    ControlPlaneUnreachable { switch: String, reason: String },

    #[error("trunk {trunk} does not exist on switch {switch}")]
    MissingTrunk { switch: String, trunk: String },

    #[error("topology incomplete: {0}")]
    TopologyIncomplete(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no ports on {switch} connect to {}", peers.join(", "))]
    NoConnectingPorts { switch: String, peers: Vec<String> },

    #[error("command failed on {switch}: {message}")]
    CommandFailed { switch: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ZtpError {
    pub fn unreachable(switch: &str, reason: impl Into<String>) -> Self {
        Self::ControlPlaneUnreachable {
            switch: switch.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing_trunk(switch: &str, trunk: &str) -> Self {
        Self::MissingTrunk {
            switch: switch.to_string(),
            trunk: trunk.to_string(),
        }
    }

    /// Short machine-readable kind, used in the run report
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSupernet { .. } => "invalid_supernet",
            Self::AddressSpaceExhausted(_) => "address_space_exhausted",
            Self::ControlPlaneUnreachable { .. } => "control_plane_unreachable",
            Self::MissingTrunk { .. } => "missing_trunk",
            Self::TopologyIncomplete(_) => "topology_incomplete",
            Self::InvalidAddress(_) => "invalid_address",
            Self::NoConnectingPorts { .. } => "no_connecting_ports",
            Self::CommandFailed { .. } => "command_failed",
            Self::Config(_) => "config",
        }
    }
}

pub type Result<T, E = ZtpError> = std::result::Result<T, E>;
