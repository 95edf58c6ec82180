use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::ipam::LinkAddress;

/// Vrouter is the per-switch routing instance carrying the layer-3 underlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vrouter {
    pub name: String,
    /// Switch the vrouter runs on
    pub switch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_as: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router_id: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_redistribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_max_paths: Option<u32>,
}

impl Vrouter {
    /// Vrouter name for a switch, e.g. `spine1-vrouter`
    pub fn name_for(switch: &str) -> String {
        format!("{}-vrouter", switch)
    }
}

/// Layer-3 interface bound to a physical port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VrouterInterface {
    pub vrouter: String,
    pub port: String,
    pub address: LinkAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopbackInterface {
    pub vrouter: String,
    pub address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpNeighbor {
    pub vrouter: String,
    pub neighbor: Ipv4Addr,
    pub remote_as: u32,
}
