//! Address planning for fabric links, loopbacks and in-band management.
//!
//! Point-to-point links are carved out of a base network in supernet-sized
//! sub-blocks. Each third octet of the base block is walked from its first
//! aligned sub-block up to the block's broadcast boundary, emitting the usable
//! host addresses of every sub-block in ascending order.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{Result, ZtpError};
use crate::utils::{parse_cidr, prefix_mask};

/// Usable host addresses per sub-block for each supported supernet length
pub const SUPERNET_HOSTS: &[(u8, u32)] = &[(30, 2), (29, 6), (28, 14), (27, 30)];

/// Usable host count for a supernet length, or None when unsupported
pub fn usable_hosts(supernet: u8) -> Option<u32> {
    SUPERNET_HOSTS
        .iter()
        .find(|(len, _)| *len == supernet)
        .map(|(_, hosts)| *hosts)
}

/// An interface address with its prefix length, rendered as `a.b.c.d/len`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkAddress {
    pub addr: Ipv4Addr,
    pub prefix_len: u8,
}

impl LinkAddress {
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Self {
        Self { addr, prefix_len }
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for LinkAddress {
    type Err = ZtpError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix_len) = parse_cidr(s)?;
        Ok(Self { addr, prefix_len })
    }
}

/// AddressBlock describes the base network links are carved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddressBlock {
    pub base: Ipv4Addr,
    pub cidr: u8,
    pub supernet: u8,
}

impl AddressBlock {
    pub fn new(base: Ipv4Addr, cidr: u8, supernet: u8) -> Result<Self> {
        if cidr > 32 {
            return Err(ZtpError::InvalidAddress(format!("prefix length /{} out of range", cidr)));
        }
        // A sub-block must fit inside the base block
        if usable_hosts(supernet).is_none() || supernet < cidr {
            return Err(ZtpError::InvalidSupernet { supernet, cidr });
        }
        Ok(Self { base, cidr, supernet })
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.base) & prefix_mask(self.cidr))
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network()) | !prefix_mask(self.cidr))
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & prefix_mask(self.cidr) == u32::from(self.network())
    }

    pub fn usable_per_block(&self) -> u32 {
        usable_hosts(self.supernet).unwrap_or(0)
    }
}

/// Ordered, lazily produced stream of usable point-to-point addresses.
/// Not resumable: once exhausted a new stream must be computed.
#[derive(Debug, Clone)]
pub struct LinkAddresses {
    block: AddressBlock,
    leading: [u8; 2],
    third: u32,
    third_end: u32,
    last_host: u32,
    first_host: u32,
    pending: VecDeque<LinkAddress>,
}

impl LinkAddresses {
    /// Usable host offsets in one third octet, starting at sub-block `start`
    fn hosts_from(&self, start: u32) -> Vec<u32> {
        let range = self.block.usable_per_block();
        let mut hosts = Vec::new();
        let mut i = start;
        while i < self.last_host {
            let hostmin = i + 1;
            let hostmax = hostmin + range - 1;
            hosts.extend(hostmin..=hostmax);
            i = hostmax + 2;
        }
        hosts
    }

    fn fill_next_octet(&mut self) {
        let hosts = self.hosts_from(self.first_host);
        // Only the first octet starts from the caller's aligned offset
        self.first_host = 0;
        for host in hosts {
            self.pending.push_back(LinkAddress::new(
                Ipv4Addr::new(self.leading[0], self.leading[1], self.third as u8, host as u8),
                self.block.supernet,
            ));
        }
        self.third += 1;
    }
}

impl Iterator for LinkAddresses {
    type Item = LinkAddress;

    fn next(&mut self) -> Option<LinkAddress> {
        loop {
            if let Some(addr) = self.pending.pop_front() {
                return Some(addr);
            }
            if self.third > self.third_end {
                return None;
            }
            self.fill_next_octet();
        }
    }
}

/// Compute the ordered usable link addresses of `base/cidr` carved in `/supernet` sub-blocks
pub fn compute_link_addresses(base: Ipv4Addr, cidr: u8, supernet: u8) -> Result<LinkAddresses> {
    let block = AddressBlock::new(base, cidr, supernet)?;
    let network = block.network().octets();
    let broadcast = block.broadcast().octets();

    let block_size = block.usable_per_block() + 2;
    let base_host = u32::from(base.octets()[3]);

    Ok(LinkAddresses {
        block,
        leading: [broadcast[0], broadcast[1]],
        third: u32::from(network[2]),
        third_end: u32::from(broadcast[2]),
        last_host: u32::from(broadcast[3]),
        first_host: base_host - base_host % block_size,
        pending: VecDeque::new(),
    })
}

/// Sequential host addresses `x.y.z.1 ..= x.y.z.count` for loopback and management assignment
pub fn compute_sequential_addresses(base: Ipv4Addr, count: usize) -> Result<Vec<Ipv4Addr>> {
    if count > 255 {
        return Err(ZtpError::AddressSpaceExhausted(format!(
            "{} addresses requested from {}, at most 255 available",
            count, base
        )));
    }
    let [a, b, c, _] = base.octets();
    Ok((1..=count).map(|host| Ipv4Addr::new(a, b, c, host as u8)).collect())
}

/// AddressCursor hands out link addresses for one planning run.
///
/// Each link takes a whole sub-block: the first two usable addresses are
/// bound and the rest of the block is discarded. Blocks holding an address
/// that is already bound on the fabric are skipped entirely.
#[derive(Debug)]
pub struct AddressCursor {
    addresses: LinkAddresses,
    supernet: u8,
    usable_per_block: usize,
    consumed: HashSet<Ipv4Addr>,
}

impl AddressCursor {
    pub fn new(addresses: LinkAddresses, already_bound: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        let supernet = addresses.block.supernet;
        let usable_per_block = addresses.block.usable_per_block() as usize;
        Self {
            addresses,
            supernet,
            usable_per_block,
            consumed: already_bound.into_iter().collect(),
        }
    }

    /// Take the next free sub-block and return its first two usable addresses
    pub fn next_link_pair(&mut self) -> Result<(LinkAddress, LinkAddress)> {
        loop {
            let block: Vec<LinkAddress> = self.addresses.by_ref().take(self.usable_per_block).collect();
            if block.len() < 2 {
                return Err(ZtpError::AddressSpaceExhausted(format!(
                    "no free /{} link block left in {}/{}",
                    self.supernet, self.addresses.block.base, self.addresses.block.cidr
                )));
            }
            if block.iter().any(|a| self.consumed.contains(&a.addr)) {
                tracing::debug!("Skipping link block starting at {}: already in use", block[0]);
                continue;
            }
            self.consumed.insert(block[0].addr);
            self.consumed.insert(block[1].addr);
            return Ok((block[0], block[1]));
        }
    }

    /// A free address in the same sub-block as `bound`, for completing a half-bound link
    pub fn partner_for(&mut self, bound: LinkAddress) -> Option<LinkAddress> {
        let network = u32::from(bound.addr) & prefix_mask(self.supernet);
        let candidate = (1..=self.usable_per_block as u32)
            .map(|offset| Ipv4Addr::from(network + offset))
            .find(|addr| *addr != bound.addr && !self.consumed.contains(addr))?;
        self.consumed.insert(candidate);
        Some(LinkAddress::new(candidate, self.supernet))
    }
}
