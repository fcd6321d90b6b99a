pub use std::collections::{BTreeMap, HashMap};
pub use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
pub use std::path::{Path, PathBuf};
pub use std::str::FromStr;
pub use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
pub use std::sync::{Arc, Mutex, MutexGuard, Weak};
pub use std::time::Duration;
pub use std::{fmt, io};

pub use log::{debug, info, warn};

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
