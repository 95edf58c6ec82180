use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::FabricControlPlane;
use crate::error::{Result, ZtpError};
use crate::models::{Attributes, ObjectKind, Record, Scope};

#[derive(Default)]
struct FabricState {
    stores: HashMap<(String, ObjectKind), Vec<Record>>,
    unreachable: HashSet<String>,
    mutations: Vec<String>,
}

/// In-memory fabric used by tests: per-switch object stores, LLDP tables
/// and a log of every mutation issued.
#[derive(Default)]
pub struct MemoryFabric {
    state: Mutex<FabricState>,
}

fn store_key(scope: &Scope, kind: ObjectKind) -> (String, ObjectKind) {
    match scope {
        Scope::Switch(name) if !kind.fabric_wide() => (name.clone(), kind),
        _ => (String::new(), kind),
    }
}

impl MemoryFabric {
    pub fn new(switches: &[&str]) -> Self {
        let fabric = Self::default();
        for name in switches {
            fabric.seed(&Scope::Fabric, ObjectKind::FabricNode, Record::new().with("name", *name));
            fabric.seed(
                &Scope::switch(name),
                ObjectKind::SystemSettings,
                Record::new().with("auto-trunk", "on"),
            );
        }
        fabric
    }

    /// Cable `a:a_port` to `b:b_port`, visible in both neighbor tables
    pub fn link(&self, a: &str, a_port: &str, b: &str, b_port: &str) {
        self.seed(
            &Scope::switch(a),
            ObjectKind::Lldp,
            Record::new().with("local-port", a_port).with("sys-name", b).with("port-id", b_port),
        );
        self.seed(
            &Scope::switch(b),
            ObjectKind::Lldp,
            Record::new().with("local-port", b_port).with("sys-name", a).with("port-id", a_port),
        );
    }

    pub fn seed(&self, scope: &Scope, kind: ObjectKind, record: Record) {
        let mut state = self.state.lock().unwrap();
        state.stores.entry(store_key(scope, kind)).or_default().push(record);
    }

    pub fn set_unreachable(&self, switch: &str) {
        self.state.lock().unwrap().unreachable.insert(switch.to_string());
    }

    pub fn records(&self, scope: &Scope, kind: ObjectKind) -> Vec<Record> {
        let state = self.state.lock().unwrap();
        state.stores.get(&store_key(scope, kind)).cloned().unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    fn check_reachable(state: &FabricState, scope: &Scope) -> Result<()> {
        match scope {
            Scope::Switch(name) if state.unreachable.contains(name) => {
                Err(ZtpError::unreachable(name, "connection timed out"))
            }
            _ => Ok(()),
        }
    }

    fn note(state: &mut FabricState, scope: &Scope, kind: ObjectKind, verb: &str, attrs: &Attributes) {
        let detail: Vec<String> = attrs
            .iter()
            .map(|(k, v)| if v.is_empty() { k.to_string() } else { format!("{} {}", k, v) })
            .collect();
        state
            .mutations
            .push(format!("{} {}-{} {}", scope.label(), kind, verb, detail.join(" ")));
    }
}

#[async_trait]
impl FabricControlPlane for MemoryFabric {
    async fn query(&self, scope: &Scope, kind: ObjectKind, filters: &Attributes) -> Result<Vec<Record>> {
        let state = self.state.lock().unwrap();
        Self::check_reachable(&state, scope)?;
        Ok(state
            .stores
            .get(&store_key(scope, kind))
            .map(|rows| rows.iter().filter(|r| r.matches(filters)).cloned().collect())
            .unwrap_or_default())
    }

    async fn create(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state, scope)?;
        let mut record = Record::from(attrs);
        if kind == ObjectKind::Vrouter && record.get("location").is_none() {
            record.insert("location", scope.label());
        }
        state.stores.entry(store_key(scope, kind)).or_default().push(record);
        Self::note(&mut state, scope, kind, kind.create_verb(), attrs);
        Ok(())
    }

    async fn modify(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state, scope)?;
        let rows = state.stores.entry(store_key(scope, kind)).or_default();
        if rows.is_empty() {
            rows.push(Record::new());
        }
        let target = match attrs.get("name") {
            Some(name) => rows.iter_mut().find(|r| r.get("name") == Some(name)),
            None => rows.first_mut(),
        };
        let Some(record) = target else {
            return Err(ZtpError::CommandFailed {
                switch: scope.label().to_string(),
                message: format!("{} not found", kind),
            });
        };
        for (key, value) in attrs.iter() {
            match (key.strip_prefix("no-"), value.is_empty()) {
                (Some(setting), true) => record.insert(setting, "off"),
                (None, true) => record.insert(key, "on"),
                _ => record.insert(key, value),
            }
        }
        Self::note(&mut state, scope, kind, "modify", attrs);
        Ok(())
    }

    async fn delete(&self, scope: &Scope, kind: ObjectKind, attrs: &Attributes) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_reachable(&state, scope)?;
        if let Some(rows) = state.stores.get_mut(&store_key(scope, kind)) {
            rows.retain(|r| !r.matches(attrs));
        }
        Self::note(&mut state, scope, kind, kind.delete_verb(), attrs);
        Ok(())
    }
}
