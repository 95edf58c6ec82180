use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of objects the fabric control plane can show, create, modify or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    FabricNode,
    Lldp,
    Cluster,
    Trunk,
    Vlag,
    Vrouter,
    VrouterInterface,
    VrouterLoopbackInterface,
    VrouterBgp,
    SystemSettings,
    SwitchSetup,
}

impl ObjectKind {
    /// CLI command stem, e.g. `trunk` in `trunk-show`
    pub fn stem(&self) -> &'static str {
        match self {
            ObjectKind::FabricNode => "fabric-node",
            ObjectKind::Lldp => "lldp",
            ObjectKind::Cluster => "cluster",
            ObjectKind::Trunk => "trunk",
            ObjectKind::Vlag => "vlag",
            ObjectKind::Vrouter => "vrouter",
            ObjectKind::VrouterInterface => "vrouter-interface",
            ObjectKind::VrouterLoopbackInterface => "vrouter-loopback-interface",
            ObjectKind::VrouterBgp => "vrouter-bgp",
            ObjectKind::SystemSettings => "system-settings",
            ObjectKind::SwitchSetup => "switch-setup",
        }
    }

    /// Verb used to create the object; interfaces and neighbors are "added"
    pub fn create_verb(&self) -> &'static str {
        match self {
            ObjectKind::VrouterInterface
            | ObjectKind::VrouterLoopbackInterface
            | ObjectKind::VrouterBgp => "add",
            _ => "create",
        }
    }

    /// Verb used to delete the object
    pub fn delete_verb(&self) -> &'static str {
        match self.create_verb() {
            "add" => "remove",
            _ => "delete",
        }
    }

    /// Fields requested when showing the object
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            ObjectKind::FabricNode => &["name"],
            ObjectKind::Lldp => &["local-port", "sys-name", "port-id"],
            ObjectKind::Cluster => &["name", "cluster-node-1", "cluster-node-2"],
            ObjectKind::Trunk => &["name", "ports"],
            ObjectKind::Vlag => &["name", "peer-switch", "port", "peer-port"],
            ObjectKind::Vrouter => &[
                "name",
                "location",
                "bgp-as",
                "router-id",
                "bgp-redistribute",
                "bgp-max-paths",
            ],
            ObjectKind::VrouterInterface => &["vrouter-name", "l3-port", "ip"],
            ObjectKind::VrouterLoopbackInterface => &["vrouter-name", "ip"],
            ObjectKind::VrouterBgp => &["vrouter-name", "neighbor", "remote-as"],
            ObjectKind::SystemSettings => &["auto-trunk"],
            ObjectKind::SwitchSetup => &["in-band-ip"],
        }
    }

    /// Objects listed fabric-wide rather than per switch
    pub fn fabric_wide(&self) -> bool {
        matches!(
            self,
            ObjectKind::FabricNode
                | ObjectKind::Cluster
                | ObjectKind::Vrouter
                | ObjectKind::VrouterInterface
                | ObjectKind::VrouterLoopbackInterface
                | ObjectKind::VrouterBgp
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Where a request is executed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    Fabric,
    Switch(String),
}

impl Scope {
    pub fn switch(name: &str) -> Self {
        Scope::Switch(name.to_string())
    }

    /// Switch name for logging; `fabric` for fabric-wide requests
    pub fn label(&self) -> &str {
        match self {
            Scope::Fabric => "fabric",
            Scope::Switch(name) => name,
        }
    }
}

/// Ordered key/value pairs for filters and mutation attributes.
/// An empty value renders as a bare flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.push((key.to_string(), value.into()));
        self
    }

    pub fn flag(self, key: &str) -> Self {
        self.with(key, "")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One parsed row of a show command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.as_str()).filter(|v| !v.is_empty())
    }

    /// Value of `key`, or empty string when the field is absent
    pub fn field(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    /// True when every filter pair matches this record
    pub fn matches(&self, filters: &Attributes) -> bool {
        filters
            .iter()
            .all(|(k, v)| self.0.get(k).map(|x| x.as_str()) == Some(v))
    }
}

impl From<&Attributes> for Record {
    fn from(attrs: &Attributes) -> Self {
        let mut record = Record::new();
        for (k, v) in attrs.iter() {
            record.insert(k, v);
        }
        record
    }
}
