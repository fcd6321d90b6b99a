//! Node and link control plane for a network emulator. *Currently linux-only*.
//!
//! This crate creates, tracks and tears down emulated hosts ([`Node`]) and emulated
//! networks ([`Network`], a switch/hub abstraction). Each host is backed by an isolated
//! OS-level network namespace launched through an external helper daemon, and every
//! OS-touching operation is routed through a pluggable [`Executor`] so a node behaves
//! identically whether it runs on the local host or on a remote server.
//!
//! # Creating a node
//!
//! ```ignore
//! use netemu::{Node, NodeOptions, SessionContext};
//!
//! let session = SessionContext::new(0xbeef, "/tmp/netemu.beef");
//! let node = Node::new(session, NodeOptions::default());
//! node.startup()?;
//! let ifindex = node.new_netif(Some(&switch), &addrs, None, None, None)?;
//! ```
//!
//! # Topology export
//!
//! [`Network::all_link_data`] walks the interfaces attached to a network and produces
//! one directed [`LinkData`] record per resolvable peer, emitting a mirrored second
//! record whenever an interface carries asymmetric forward/reverse link parameters.

mod priv_prelude;

pub mod addr;
pub mod client;
pub mod error;
pub mod exec;
pub mod iface;
pub mod link;
pub mod mac;
pub mod netclient;
pub mod network;
pub mod node;
pub mod object;
pub mod position;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use crate::addr::IfaceAddr;
pub use crate::client::NamespaceClient;
pub use crate::error::{CmdError, Error};
pub use crate::exec::{CmdOpts, DistributedServer, Executor, LocalExecutor};
pub use crate::iface::{Iface, IfaceKind};
pub use crate::link::{LinkData, LinkParams, LinkType, NodeData, NodeType};
pub use crate::mac::MacAddr;
pub use crate::netclient::{get_net_client, CmdRunner, NetClient};
pub use crate::network::{Network, NetworkOptions};
pub use crate::node::{Node, NodeOptions};
pub use crate::object::{IfaceMap, NodeObject, ObjectCore};
pub use crate::position::Position;
pub use crate::session::{SessionContext, SessionOptions};
