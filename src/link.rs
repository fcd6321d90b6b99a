use crate::priv_prelude::*;

/// Wire-level node type stamped into exported [`NodeData`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Default,
    Switch,
    Hub,
    WirelessLan,
    Tunnel,
    TapBridge,
}

/// Link classification stamped into every [`LinkData`] record a network emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Wired,
    Wireless,
}

/// Emulation parameters for one direction of a link.
///
/// All fields are optional; an unset field means "no emulation configured".
/// The forward and reverse sets on an interface are compared field-wise to
/// detect asymmetric links.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LinkParams {
    pub delay: Option<Duration>,
    /// Bits per second.
    pub bandwidth: Option<u64>,
    /// Packet-error-rate, percent.
    pub loss: Option<f64>,
    /// Duplication rate, percent.
    pub dup: Option<f64>,
    pub jitter: Option<Duration>,
}

/// Exportable snapshot of a directed link, produced on demand and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkData {
    pub message_type: u32,
    pub node1_id: u32,
    pub node2_id: u32,
    pub link_type: LinkType,
    pub unidirectional: bool,
    /// Index of the interface on the far-end node, when resolvable.
    pub iface2_id: Option<u32>,
    pub iface2_mac: Option<MacAddr>,
    pub iface2_ip4: Option<Ipv4Addr>,
    pub iface2_ip4_mask: Option<u8>,
    pub iface2_ip6: Option<Ipv6Addr>,
    pub iface2_ip6_mask: Option<u8>,
    pub params: LinkParams,
}

/// Exportable snapshot of a node, produced on demand and never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub message_type: u32,
    pub id: u32,
    pub node_type: NodeType,
    pub name: String,
    pub canvas: Option<u32>,
    pub icon: Option<String>,
    pub opaque: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub model: Option<String>,
    pub server: Option<String>,
    /// `|`-joined service names, `None` when the node carries no services.
    pub services: Option<String>,
    pub source: Option<String>,
}
