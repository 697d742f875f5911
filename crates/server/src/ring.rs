//! Consistent-hash ring over shard ports.
//!
//! Every port owns `virtual_nodes` positions on a 32-bit ring. Position `v` of port `p` is
//! the hash of `"{p}-VN-{v}"`. A key belongs to the first position at or after its own hash,
//! wrapping around to the start of the ring.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct HashRing {
    positions: BTreeMap<u32, u16>,
    virtual_nodes: u32,
}

impl HashRing {
    pub fn new(virtual_nodes: u32) -> Self {
        Self {
            positions: BTreeMap::new(),
            virtual_nodes,
        }
    }

    pub fn with_ports(ports: &[u16], virtual_nodes: u32) -> Self {
        let mut ring = Self::new(virtual_nodes);
        for port in ports {
            ring.add(*port);
        }
        ring
    }

    pub fn add(&mut self, port: u16) {
        for v in 0..self.virtual_nodes {
            self.positions.insert(ring_hash(&format!("{}-VN-{}", port, v)), port);
        }
    }

    pub fn remove(&mut self, port: u16) {
        self.positions.retain(|_, owner| *owner != port);
    }

    /// The port owning `key`, or `None` on an empty ring.
    pub fn port_for(&self, key: &str) -> Option<u16> {
        let hash = ring_hash(key);
        self.positions
            .range(hash..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, port)| *port)
    }

    /// Distinct ports on the ring, ascending.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.positions.values().copied().collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// First four bytes of the SHA-256 digest, big-endian.
pub fn ring_hash(key: &str) -> u32 {
    let digest = Sha256::digest(key.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
