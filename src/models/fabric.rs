use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ZtpError;

/// Canonical fabric role values
pub mod fabric_role {
    pub const SPINE: &str = "spine";
    pub const LEAF: &str = "leaf";
}

/// Role of a switch in a leaf-spine fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spine,
    Leaf,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Spine => fabric_role::SPINE,
            Role::Leaf => fabric_role::LEAF,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Switch is a fabric member identified by its node name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Switch {
    pub name: String,
    pub role: Role,
}

impl Switch {
    pub fn spine(name: impl Into<String>) -> Self {
        Self { name: name.into(), role: Role::Spine }
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self { name: name.into(), role: Role::Leaf }
    }

    pub fn is_spine(&self) -> bool {
        self.role == Role::Spine
    }
}

/// Fabric construction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FabricMode {
    Layer2,
    Layer3,
}

impl FromStr for FabricMode {
    type Err = ZtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "layer2" | "l2" => Ok(FabricMode::Layer2),
            "layer3" | "l3" => Ok(FabricMode::Layer3),
            other => Err(ZtpError::Config(format!(
                "unknown fabric type '{}' (expected layer2 or layer3)",
                other
            ))),
        }
    }
}

impl fmt::Display for FabricMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FabricMode::Layer2 => f.write_str("layer2"),
            FabricMode::Layer3 => f.write_str("layer3"),
        }
    }
}

/// Cluster is a redundant pair of switches presented as one logical unit.
/// Node order is kept as created so re-creation checks compare like for like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub node1: String,
    pub node2: String,
}

impl Cluster {
    /// Leaf cluster named after its members, e.g. `leaf1-to-leaf2-cluster`
    pub fn for_pair(node1: &str, node2: &str) -> Self {
        Self {
            name: format!("{}-to-{}-cluster", node1, node2),
            node1: node1.to_string(),
            node2: node2.to_string(),
        }
    }

    pub fn contains(&self, switch: &str) -> bool {
        self.node1 == switch || self.node2 == switch
    }

    /// Same membership regardless of node order
    pub fn same_members(&self, other: &Cluster) -> bool {
        (self.node1 == other.node1 && self.node2 == other.node2)
            || (self.node1 == other.node2 && self.node2 == other.node1)
    }
}

/// One physical link as seen from the local switch's neighbor table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjacencyEdge {
    pub local: String,
    pub remote: String,
    pub local_port: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<String>,
}

/// Normalized adjacency snapshot for one planning run.
/// Edges keep discovery order; parallel links appear as separate edges.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Adjacency {
    pub edges: Vec<AdjacencyEdge>,
    /// Leaves whose neighbor table could not be read
    pub unreachable: Vec<String>,
}

impl Adjacency {
    pub fn new(edges: Vec<AdjacencyEdge>) -> Self {
        Self { edges, unreachable: Vec::new() }
    }

    /// Distinct neighbors of `switch`, in first-seen order
    pub fn neighbors(&self, switch: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| e.local == switch)
            .map(|e| e.remote.as_str())
            .filter(|r| seen.insert(*r))
            .collect()
    }

    /// Edges from `switch` toward `remote`, in discovery order
    pub fn links_between<'a>(
        &'a self,
        switch: &'a str,
        remote: &'a str,
    ) -> impl Iterator<Item = &'a AdjacencyEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.local == switch && e.remote == remote)
    }

    /// Local ports on `switch` facing any of `peers`, deduplicated, in peer order
    pub fn ports_toward(&self, switch: &str, peers: &[String]) -> Vec<String> {
        let mut ports: Vec<String> = Vec::new();
        for peer in peers {
            for edge in self.links_between(switch, peer) {
                if !ports.contains(&edge.local_port) {
                    ports.push(edge.local_port.clone());
                }
            }
        }
        ports
    }

    /// Find the edge leaving `switch` on `port`
    pub fn edge_on_port(&self, switch: &str, port: &str) -> Option<&AdjacencyEdge> {
        self.edges
            .iter()
            .find(|e| e.local == switch && e.local_port == port)
    }

    /// Port on the far end of `edge`, from its own LLDP row or else from
    /// the remote switch's row pointing back at it
    pub fn remote_port<'a>(&'a self, edge: &'a AdjacencyEdge) -> Option<&'a str> {
        if let Some(port) = &edge.remote_port {
            return Some(port.as_str());
        }
        self.edges
            .iter()
            .find(|e| {
                e.local == edge.remote
                    && e.remote == edge.local
                    && e.remote_port.as_deref() == Some(edge.local_port.as_str())
            })
            .map(|e| e.local_port.as_str())
    }
}

/// Trunk is an aggregation of local ports toward one remote-system set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trunk {
    pub name: String,
    pub switch: String,
    pub ports: Vec<String>,
}

impl Trunk {
    /// Deterministic trunk name, e.g. `leaf1-to-spine1spine2`
    pub fn name_for(switch: &str, peers: &[String]) -> String {
        format!("{}-to-{}", switch, peers.concat())
    }

    pub fn has_port(&self, port: &str) -> bool {
        self.ports.iter().any(|p| p == port)
    }
}

/// RedundantLinkGroup (vlag) pairs a local trunk with a peer trunk across a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundantLinkGroup {
    pub name: String,
    pub switch: String,
    pub peer_switch: String,
    pub trunk: String,
    pub peer_trunk: String,
}

/// Split a comma-separated list, dropping blanks and surrounding whitespace
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(local: &str, remote: &str, port: &str) -> AdjacencyEdge {
        AdjacencyEdge {
            local: local.to_string(),
            remote: remote.to_string(),
            local_port: port.to_string(),
            remote_port: None,
        }
    }

    #[test]
    fn test_remote_port_falls_back_to_reverse_row() {
        let mut spine_row = edge("spine1", "leaf1", "11");
        spine_row.remote_port = Some("1".to_string());
        let adj = Adjacency::new(vec![edge("leaf1", "spine1", "1"), spine_row.clone(), edge("leaf1", "spine1", "2")]);

        assert_eq!(adj.remote_port(&adj.edges[0]), Some("11"));
        assert_eq!(adj.remote_port(&spine_row), Some("1"));
        assert_eq!(adj.remote_port(&adj.edges[2]), None);
    }

    #[test]
    fn test_neighbors_dedup_in_discovery_order() {
        let adj = Adjacency::new(vec![
            edge("leaf1", "spine2", "1"),
            edge("leaf1", "leaf2", "5"),
            edge("leaf1", "spine2", "2"),
            edge("leaf1", "spine1", "3"),
            edge("leaf2", "leaf1", "5"),
        ]);
        assert_eq!(adj.neighbors("leaf1"), vec!["spine2", "leaf2", "spine1"]);
        assert_eq!(adj.neighbors("leaf3"), Vec::<&str>::new());
    }

    #[test]
    fn test_ports_toward_dedups_parallel_links() {
        let adj = Adjacency::new(vec![
            edge("leaf1", "spine1", "1"),
            edge("leaf1", "spine1", "2"),
            edge("leaf1", "spine2", "3"),
            edge("leaf1", "spine1", "1"),
            edge("leaf1", "leaf2", "9"),
        ]);
        let peers = vec!["spine1".to_string(), "spine2".to_string()];
        assert_eq!(adj.ports_toward("leaf1", &peers), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_cluster_membership_ignores_order() {
        let a = Cluster::for_pair("leaf1", "leaf2");
        let b = Cluster::for_pair("leaf2", "leaf1");
        assert_eq!(a.name, "leaf1-to-leaf2-cluster");
        assert!(a.same_members(&b));
        assert!(a.contains("leaf2"));
        assert!(!a.contains("leaf3"));
    }

    #[test]
    fn test_fabric_mode_parse() {
        assert_eq!("layer2".parse::<FabricMode>().unwrap(), FabricMode::Layer2);
        assert_eq!("Layer3".parse::<FabricMode>().unwrap(), FabricMode::Layer3);
        assert!("layer4".parse::<FabricMode>().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" spine1, spine2 ,,"), vec!["spine1", "spine2"]);
        assert!(split_list("").is_empty());
    }
}
