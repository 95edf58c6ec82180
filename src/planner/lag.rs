use crate::control::FabricControlPlane;
use crate::error::{Result, ZtpError};
use crate::models::{ActionLog, Adjacency, Attributes, ObjectKind, Outcome, RedundantLinkGroup, Scope, Trunk};
use crate::topology::TopologyReader;

/// Aggregate every port on `switch` facing any of `peers` into one trunk.
///
/// An existing trunk of the same name is returned unchanged.
pub async fn build_trunk(
    control: &dyn FabricControlPlane,
    adjacency: &Adjacency,
    log: &mut ActionLog,
    switch: &str,
    peers: &[String],
) -> Result<Trunk> {
    let name = Trunk::name_for(switch, peers);
    let existing = TopologyReader::new(control).existing_trunks(switch).await?;
    if let Some(trunk) = existing.into_iter().find(|t| t.name == name) {
        log.record(switch, ObjectKind::Trunk, &name, Outcome::AlreadyExists);
        return Ok(trunk);
    }

    let ports = adjacency.ports_toward(switch, peers);
    if ports.is_empty() {
        return Err(ZtpError::NoConnectingPorts {
            switch: switch.to_string(),
            peers: peers.to_vec(),
        });
    }

    let attrs = Attributes::new()
        .with("name", name.as_str())
        .with("ports", ports.join(","));
    control.create(&Scope::switch(switch), ObjectKind::Trunk, &attrs).await?;
    log.record(switch, ObjectKind::Trunk, &name, Outcome::Created);

    Ok(Trunk {
        name,
        switch: switch.to_string(),
        ports,
    })
}

/// Join `trunk` on `switch` and `peer_trunk` on `peer_switch` into a vlag
/// named `name`, created on `switch` in active-active mode.
pub async fn build_redundant_link_group(
    control: &dyn FabricControlPlane,
    log: &mut ActionLog,
    name: &str,
    switch: &str,
    peer_switch: &str,
    trunk: &str,
    peer_trunk: &str,
) -> Result<RedundantLinkGroup> {
    let reader = TopologyReader::new(control);
    if let Some(vlag) = reader
        .existing_vlags(switch)
        .await?
        .into_iter()
        .find(|v| v.name == name)
    {
        log.record(switch, ObjectKind::Vlag, name, Outcome::AlreadyExists);
        return Ok(vlag);
    }

    for (owner, wanted) in [(switch, trunk), (peer_switch, peer_trunk)] {
        let trunks = reader.existing_trunks(owner).await?;
        if !trunks.iter().any(|t| t.name == wanted) {
            return Err(ZtpError::missing_trunk(owner, wanted));
        }
    }

    let attrs = Attributes::new()
        .with("name", name)
        .with("port", trunk)
        .with("peer-switch", peer_switch)
        .with("peer-port", peer_trunk)
        .with("mode", "active-active");
    control.create(&Scope::switch(switch), ObjectKind::Vlag, &attrs).await?;
    log.record(switch, ObjectKind::Vlag, name, Outcome::Created);

    Ok(RedundantLinkGroup {
        name: name.to_string(),
        switch: switch.to_string(),
        peer_switch: peer_switch.to_string(),
        trunk: trunk.to_string(),
        peer_trunk: peer_trunk.to_string(),
    })
}
