use serde::Serialize;
use std::env;
use std::net::Ipv4Addr;

use crate::bgp::BgpSettings;
use crate::control::CliSession;
use crate::error::{Result, ZtpError};
use crate::ipam::usable_hosts;
use crate::models::{split_list, FabricMode};
use crate::utils;

const REDISTRIBUTE_CHOICES: &[&str] = &["none", "static", "connected", "rip", "ospf"];

/// Config holds the raw ZTP configuration as read from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub fabric_name: String,
    pub fabric_type: String,
    pub spines: String,
    pub leaves: String,
    pub link_network: String,
    pub link_cidr: String,
    pub link_supernet: String,
    pub assign_loopback: bool,
    pub loopback_ip: String,
    pub inband_ip: String,
    pub bgp_as: String,
    pub bgp_redistribute: String,
    pub bgp_max_paths: String,
    pub cluster_l3_leaves: bool,
    pub cli_host: String,
    pub cli_user: String,
    pub cli_pass: String,
    pub cli_timeout_secs: u64,
}

/// Point-to-point link addressing for layer-3 fabrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSettings {
    pub network: Ipv4Addr,
    pub cidr: u8,
    pub supernet: u8,
}

/// FabricSettings is the validated, typed view of Config handed to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FabricSettings {
    pub fabric_name: String,
    pub mode: FabricMode,
    pub spines: Vec<String>,
    pub leaves: Vec<String>,
    pub link: Option<LinkSettings>,
    /// Base for sequential loopback addresses, when loopbacks are assigned
    pub loopback_base: Option<Ipv4Addr>,
    /// Base and prefix length for in-band management addresses
    pub inband: Option<(Ipv4Addr, u8)>,
    pub bgp: Option<BgpSettings>,
    pub cluster_l3_leaves: bool,
}

impl FabricSettings {
    /// Minimal settings for `mode` with every optional phase disabled
    pub fn new(fabric_name: &str, mode: FabricMode, spines: Vec<String>, leaves: Vec<String>) -> Self {
        Self {
            fabric_name: fabric_name.to_string(),
            mode,
            spines,
            leaves,
            link: None,
            loopback_base: None,
            inband: None,
            bgp: None,
            cluster_l3_leaves: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            fabric_name: get_env("ZTP_FABRIC_NAME", "fabric"),
            fabric_type: get_env("ZTP_FABRIC_TYPE", "layer2"),
            spines: get_env("ZTP_SPINES", ""),
            leaves: get_env("ZTP_LEAVES", ""),
            link_network: get_env("ZTP_LINK_NETWORK", ""),
            link_cidr: get_env("ZTP_LINK_CIDR", "24"),
            link_supernet: get_env("ZTP_LINK_SUPERNET", "30"),
            assign_loopback: parse_bool(&get_env("ZTP_ASSIGN_LOOPBACK", "false")),
            loopback_ip: get_env("ZTP_LOOPBACK_IP", "101.101.101.0/32"),
            inband_ip: get_env("ZTP_INBAND_IP", ""),
            bgp_as: get_env("ZTP_BGP_AS", ""),
            bgp_redistribute: get_env("ZTP_BGP_REDISTRIBUTE", "connected"),
            bgp_max_paths: get_env("ZTP_BGP_MAX_PATHS", "16"),
            cluster_l3_leaves: parse_bool(&get_env("ZTP_CLUSTER_L3_LEAVES", "false")),
            cli_host: get_env("ZTP_CLI_HOST", ""),
            cli_user: get_env("ZTP_CLI_USER", "network-admin"),
            cli_pass: get_env("ZTP_CLI_PASS", ""),
            cli_timeout_secs: get_env("ZTP_CLI_TIMEOUT", "30").parse().unwrap_or(30),
        }
    }

    /// CLI session used by the Netvisor control plane
    pub fn cli_session(&self) -> Result<CliSession> {
        if self.cli_host.is_empty() {
            return Err(ZtpError::Config("ZTP_CLI_HOST is required".to_string()));
        }
        Ok(CliSession {
            host: self.cli_host.clone(),
            username: self.cli_user.clone(),
            password: self.cli_pass.clone(),
            timeout_secs: self.cli_timeout_secs,
        })
    }

    /// Validate and convert into typed fabric settings
    pub fn fabric_settings(&self) -> Result<FabricSettings> {
        let mode: FabricMode = self.fabric_type.parse()?;
        let spines = switch_list("ZTP_SPINES", &self.spines)?;
        let leaves = switch_list("ZTP_LEAVES", &self.leaves)?;
        let mut settings = FabricSettings::new(&self.fabric_name, mode, spines, leaves);

        if mode == FabricMode::Layer3 {
            settings.link = Some(self.link_settings()?);
            settings.cluster_l3_leaves = self.cluster_l3_leaves;
            if !self.bgp_as.is_empty() {
                settings.bgp = Some(self.bgp_settings(settings.leaves.len())?);
            }
        }
        if self.assign_loopback {
            let (base, _) = utils::parse_cidr(&self.loopback_ip)?;
            settings.loopback_base = Some(base);
        }
        if !self.inband_ip.is_empty() {
            settings.inband = Some(utils::parse_cidr(&self.inband_ip)?);
        }
        Ok(settings)
    }

    fn link_settings(&self) -> Result<LinkSettings> {
        if self.link_network.is_empty() {
            return Err(ZtpError::Config(
                "ZTP_LINK_NETWORK is required for a layer3 fabric".to_string(),
            ));
        }
        let network = utils::parse_ipv4(&self.link_network)?;
        let cidr = parse_number::<u8>("ZTP_LINK_CIDR", &self.link_cidr)?;
        let supernet = parse_number::<u8>("ZTP_LINK_SUPERNET", &self.link_supernet)?;
        if cidr > 32 {
            return Err(ZtpError::InvalidAddress(format!("/{} is not a prefix length", cidr)));
        }
        if usable_hosts(supernet).is_none() || supernet < cidr {
            return Err(ZtpError::InvalidSupernet { supernet, cidr });
        }
        Ok(LinkSettings { network, cidr, supernet })
    }

    /// Leaves take base+1 onward, so the whole range must fit in a u32
    fn bgp_settings(&self, leaf_count: usize) -> Result<BgpSettings> {
        let redistribute = self.bgp_redistribute.trim().to_lowercase();
        if !REDISTRIBUTE_CHOICES.contains(&redistribute.as_str()) {
            return Err(ZtpError::Config(format!(
                "ZTP_BGP_REDISTRIBUTE must be one of {}, got '{}'",
                REDISTRIBUTE_CHOICES.join(", "),
                self.bgp_redistribute
            )));
        }
        let base_as: u32 = parse_number("ZTP_BGP_AS", &self.bgp_as)?;
        if u32::try_from(leaf_count)
            .ok()
            .and_then(|n| base_as.checked_add(n))
            .is_none()
        {
            return Err(ZtpError::Config(format!(
                "ZTP_BGP_AS {} leaves no room for {} leaf AS numbers",
                base_as, leaf_count
            )));
        }
        Ok(BgpSettings {
            base_as,
            redistribute,
            max_paths: parse_number("ZTP_BGP_MAX_PATHS", &self.bgp_max_paths)?,
        })
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ZtpError::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn switch_list(key: &str, raw: &str) -> Result<Vec<String>> {
    let names = split_list(raw);
    if let Some(bad) = names.iter().find(|n| !utils::is_valid_hostname(n)) {
        return Err(ZtpError::Config(format!("{} has an invalid switch name '{}'", key, bad)));
    }
    Ok(names)
}
