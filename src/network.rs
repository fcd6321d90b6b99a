use crate::priv_prelude::*;

const IF_NAMESIZE: usize = libc::IF_NAMESIZE as usize;

/// Construction options for a [`Network`]. Unset fields get session defaults.
#[derive(Clone)]
pub struct NetworkOptions {
    pub id: Option<u32>,
    pub name: Option<String>,
    /// Wire node type stamped into exported snapshots. `None` suppresses
    /// [`NodeData`] export entirely.
    pub node_type: Option<NodeType>,
    /// Link type stamped into every link record this network synthesizes.
    pub link_type: LinkType,
    /// Whether attached interfaces are provisioned as tunnel-tap devices
    /// instead of veth pairs.
    pub tap_backed: bool,
    pub server: Option<Arc<DistributedServer>>,
    pub executor: Option<Arc<dyn Executor>>,
}

impl Default for NetworkOptions {
    fn default() -> NetworkOptions {
        NetworkOptions {
            id: None,
            name: None,
            node_type: Some(NodeType::Switch),
            link_type: LinkType::Wired,
            tap_backed: false,
            server: None,
            executor: None,
        }
    }
}

struct NetState {
    up: bool,
    ifaces: IfaceMap,
    /// Per-interface link bookkeeping, keyed by interface index. Kept in sync
    /// with the registry under the same lock.
    linked: HashMap<u32, BTreeMap<String, String>>,
    position: Position,
}

/// An emulated switch or hub.
///
/// Owns the attached-interface registry and a per-interface metadata table,
/// and implements link-record synthesis over its interfaces. Concrete bridge
/// provisioning lives outside this crate; `startup`/`shutdown` only manage the
/// up flag and interface teardown.
///
/// The network's lock is distinct from any node's lock. It is never held while
/// a node lock is taken: link synthesis snapshots the interface list first and
/// resolves far ends afterwards.
pub struct Network {
    core: ObjectCore,
    // Self-handle for hanging Weak back-references off attached interfaces.
    weak: Weak<Network>,
    session: Arc<SessionContext>,
    link_type: LinkType,
    tap_backed: bool,
    executor: Arc<dyn Executor>,
    host_net: Arc<dyn NetClient>,
    state: Mutex<NetState>,
}

impl Network {
    pub fn new(session: Arc<SessionContext>, opts: NetworkOptions) -> Arc<Network> {
        let id = opts.id.unwrap_or_else(|| session.next_node_id());
        let name = opts.name.unwrap_or_else(|| format!("net{}", id));
        let executor = opts.executor.unwrap_or_else(|| match &opts.server {
            Some(server) => server.clone() as Arc<dyn Executor>,
            None => Arc::new(LocalExecutor),
        });
        let exec = executor.clone();
        let run: CmdRunner = Arc::new(move |args: &str| exec.run(args, &CmdOpts::default()));
        let host_net = get_net_client(session.options().use_ovs, run);
        let core = ObjectCore {
            id,
            name,
            node_type: opts.node_type,
            model: None,
            canvas: None,
            icon: None,
            opaque: None,
            services: Vec::new(),
            server: executor.server_name().map(str::to_owned),
        };
        Arc::new_cyclic(|weak| Network {
            core,
            weak: weak.clone(),
            session,
            link_type: opts.link_type,
            tap_backed: opts.tap_backed,
            executor,
            host_net,
            state: Mutex::new(NetState {
                up: false,
                ifaces: IfaceMap::new(),
                linked: HashMap::new(),
                position: Position::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, NetState> {
        self.state.lock().unwrap()
    }

    pub fn is_up(&self) -> bool {
        self.lock().up
    }

    pub fn link_type(&self) -> LinkType {
        self.link_type
    }

    pub fn is_tap_backed(&self) -> bool {
        self.tap_backed
    }

    /// Run a command on the host (or remote server) this network lives on.
    pub fn host_cmd(&self, args: &str, opts: &CmdOpts) -> Result<String, Error> {
        self.executor.run(args, opts)
    }

    /// Mark the network up. Fails on an already-up network.
    pub fn startup(&self) -> Result<(), Error> {
        let mut state = self.lock();
        if state.up {
            return Err(Error::AlreadyUp(self.core.name.clone()));
        }
        state.up = true;
        info!("network({}) started", self.core.name);
        Ok(())
    }

    /// Tear the network down: shut down every attached interface best-effort
    /// and clear the registry and metadata table. A no-op when not up.
    pub fn shutdown(&self) -> Vec<Error> {
        let mut state = self.lock();
        if !state.up {
            return Vec::new();
        }
        let mut failures = Vec::new();
        for iface in state.ifaces.values(false) {
            if let Err(err) = iface.shutdown() {
                warn!(
                    "network({}) error shutting down interface {}: {}",
                    self.core.name,
                    iface.name(),
                    err,
                );
                failures.push(err);
            }
        }
        state.ifaces.clear();
        state.linked.clear();
        state.up = false;
        info!("network({}) shut down", self.core.name);
        failures
    }

    /// Attach an interface: allocate an index, register the interface, record
    /// the attachment on it and create its empty metadata entry. Returns the
    /// allocated index.
    pub fn attach(&self, iface: &Arc<Iface>) -> u32 {
        let mut state = self.lock();
        let index = state.ifaces.alloc();
        state
            .ifaces
            .insert(index, iface.clone())
            .expect("freshly allocated ifindex is free");
        state.linked.insert(index, BTreeMap::new());
        iface.set_attachment(self.weak.clone(), Some(index));
        index
    }

    /// Detach an interface, removing both the registry entry and the metadata
    /// entry under one lock acquisition.
    pub fn detach(&self, iface: &Arc<Iface>) -> Result<(), Error> {
        let mut state = self.lock();
        let index = match state.ifaces.index_of(iface) {
            Some(index) => index,
            None => {
                return Err(Error::UnknownIfindex(iface.netifi().unwrap_or(u32::MAX)));
            }
        };
        let _removed = state.ifaces.remove(index)?;
        let _meta = state.linked.remove(&index);
        iface.set_attachment(Weak::new(), None);
        Ok(())
    }

    /// Record a metadata entry for the interface at `ifindex`.
    pub fn set_linked(&self, ifindex: u32, key: &str, value: &str) -> Result<(), Error> {
        let mut state = self.lock();
        if !state.ifaces.contains(ifindex) {
            return Err(Error::UnknownIfindex(ifindex));
        }
        state
            .linked
            .entry(ifindex)
            .or_default()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    /// Metadata entries recorded for the interface at `ifindex`.
    pub fn linked_meta(&self, ifindex: u32) -> Option<BTreeMap<String, String>> {
        self.lock().linked.get(&ifindex).cloned()
    }

    /// Create a veth interface linking this network to `other`: a node-less
    /// interface attached to this network's registry with the peer recorded as
    /// its far-end network.
    pub fn linknet(&self, other: &Arc<Network>) -> Result<Arc<Iface>, Error> {
        let sessionid = self.session.short_id();
        let localname = format!("veth{:x}.{:x}.{}", self.core.id, other.core.id, sessionid);
        if localname.len() >= IF_NAMESIZE {
            return Err(Error::NameTooLong(localname));
        }
        let name = format!("{}p", localname);
        if name.len() >= IF_NAMESIZE {
            return Err(Error::NameTooLong(name));
        }

        let up = self.is_up();
        let iface = Iface::new(
            IfaceKind::Veth,
            self.host_net.clone(),
            &name,
            &localname,
            up,
            Weak::new(),
        );
        if up {
            self.host_net.create_veth(&localname, &name)?;
            self.host_net.device_up(&localname)?;
            self.host_net.device_up(&name)?;
        }
        iface.set_othernet(other);
        let _index = self.attach(&iface);
        Ok(iface)
    }
}

impl NodeObject for Network {
    fn id(&self) -> u32 {
        self.core.id
    }

    fn name(&self) -> &str {
        &self.core.name
    }

    fn set_position(&self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> bool {
        self.lock().position.set(x, y, z)
    }

    fn position(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        self.lock().position.get()
    }

    fn ifname(&self, ifindex: u32) -> Result<String, Error> {
        let state = self.lock();
        state
            .ifaces
            .get(ifindex)
            .map(|iface| iface.name())
            .ok_or(Error::UnknownIfindex(ifindex))
    }

    fn netifs(&self, sort: bool) -> Vec<Arc<Iface>> {
        self.lock().ifaces.values(sort)
    }

    fn ifindex_of(&self, iface: &Arc<Iface>) -> Option<u32> {
        self.lock().ifaces.index_of(iface)
    }

    fn new_ifindex(&self) -> u32 {
        self.lock().ifaces.alloc()
    }

    fn data(
        &self,
        message_type: u32,
        lat: Option<f64>,
        lon: Option<f64>,
        alt: Option<f64>,
        source: Option<&str>,
    ) -> Option<NodeData> {
        let position = self.lock().position.get();
        self.core.data(position, message_type, lat, lon, alt, source)
    }

    /// One directed link record per attached interface whose far end resolves
    /// to a node or a peer network, plus a mirrored unidirectional record when
    /// the interface's forward and reverse parameters differ.
    fn all_link_data(&self, flags: u32) -> Vec<LinkData> {
        // Snapshot under our own lock, resolve far ends afterwards. Resolution
        // takes node/peer locks and must never happen while ours is held.
        let snapshot = self.lock().ifaces.values(true);

        let mut all_links = Vec::new();
        for iface in snapshot {
            let (far_id, far_ifindex) = if let Some(node) = iface.node() {
                (node.id(), node.ifindex_of(&iface))
            } else if let Some(other) = iface.othernet() {
                if other.core.id == self.core.id {
                    continue;
                }
                (other.core.id, other.ifindex_of(&iface))
            } else {
                continue;
            };

            let forward = iface.params();
            let reverse = iface.reverse_params();
            let unidirectional = forward != reverse;

            // Last address of each family wins.
            let mut ip4 = None;
            let mut ip4_mask = None;
            let mut ip6 = None;
            let mut ip6_mask = None;
            for addr in iface.addrs() {
                match addr {
                    IfaceAddr::V4 { addr, prefix } => {
                        ip4 = Some(addr);
                        ip4_mask = Some(prefix);
                    }
                    IfaceAddr::V6 { addr, prefix } => {
                        ip6 = Some(addr);
                        ip6_mask = Some(prefix);
                    }
                }
            }

            all_links.push(LinkData {
                message_type: flags,
                node1_id: self.core.id,
                node2_id: far_id,
                link_type: self.link_type,
                unidirectional,
                iface2_id: far_ifindex,
                iface2_mac: iface.hwaddr(),
                iface2_ip4: ip4,
                iface2_ip4_mask: ip4_mask,
                iface2_ip6: ip6,
                iface2_ip6_mask: ip6_mask,
                params: forward,
            });

            if unidirectional {
                all_links.push(LinkData {
                    message_type: 0,
                    node1_id: far_id,
                    node2_id: self.core.id,
                    link_type: self.link_type,
                    unidirectional: true,
                    iface2_id: None,
                    iface2_mac: None,
                    iface2_ip4: None,
                    iface2_ip4_mask: None,
                    iface2_ip6: None,
                    iface2_ip6_mask: None,
                    params: reverse,
                });
            }
        }
        all_links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeOptions};
    use crate::test_helpers::{test_session, RecordingExecutor};

    fn test_node(session: &Arc<SessionContext>, id: u32) -> Arc<Node> {
        let exec = RecordingExecutor::new();
        Node::new(
            session.clone(),
            NodeOptions {
                id: Some(id),
                executor: Some(exec as Arc<dyn Executor>),
                ..NodeOptions::default()
            },
        )
    }

    fn test_network(session: &Arc<SessionContext>, id: u32) -> Arc<Network> {
        let exec = RecordingExecutor::new();
        Network::new(
            session.clone(),
            NetworkOptions {
                id: Some(id),
                executor: Some(exec as Arc<dyn Executor>),
                ..NetworkOptions::default()
            },
        )
    }

    #[test]
    fn attach_and_detach_keep_metadata_in_sync() {
        let session = test_session();
        let node = test_node(&session, 1);
        let net = test_network(&session, 100);

        let ifindex = node.new_veth(None, None).unwrap();
        let iface = node.netif(ifindex).unwrap();
        let net_index = net.attach(&iface);
        assert_eq!(net_index, 0);
        assert_eq!(iface.netifi(), Some(0));
        assert!(Arc::ptr_eq(&iface.net().unwrap(), &net));
        assert_eq!(net.linked_meta(0), Some(BTreeMap::new()));

        net.set_linked(0, "session", "1").unwrap();
        assert_eq!(
            net.linked_meta(0).unwrap().get("session"),
            Some(&"1".to_owned()),
        );

        net.detach(&iface).unwrap();
        assert_eq!(iface.netifi(), None);
        assert!(iface.net().is_none());
        assert_eq!(net.linked_meta(0), None);
        assert_eq!(net.num_netifs(), 0);
    }

    #[test]
    fn detach_of_unattached_interface_fails() {
        let session = test_session();
        let node = test_node(&session, 1);
        let net = test_network(&session, 100);

        let ifindex = node.new_veth(None, None).unwrap();
        let iface = node.netif(ifindex).unwrap();
        assert!(matches!(
            net.detach(&iface),
            Err(Error::UnknownIfindex(_)),
        ));
    }

    #[test]
    fn symmetric_link_produces_one_bidirectional_record() {
        let session = test_session();
        let node = test_node(&session, 7);
        let net = test_network(&session, 100);

        let ifindex = node
            .new_netif(
                Some(&net),
                &["10.0.0.1/24".parse().unwrap(), "fd00::1/64".parse().unwrap()],
                Some("02:01:02:03:04:05".parse().unwrap()),
                None,
                None,
            )
            .unwrap();
        let _iface = node.netif(ifindex).unwrap();

        let links = net.all_link_data(2);
        assert_eq!(links.len(), 1);
        let link = &links[0];
        assert_eq!(link.message_type, 2);
        assert_eq!(link.node1_id, 100);
        assert_eq!(link.node2_id, 7);
        assert_eq!(link.link_type, LinkType::Wired);
        assert!(!link.unidirectional);
        assert_eq!(link.iface2_id, Some(0));
        assert_eq!(link.iface2_mac, Some("02:01:02:03:04:05".parse().unwrap()));
        assert_eq!(link.iface2_ip4, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(link.iface2_ip4_mask, Some(24));
        assert_eq!(link.iface2_ip6, Some("fd00::1".parse().unwrap()));
        assert_eq!(link.iface2_ip6_mask, Some(64));
    }

    #[test]
    fn asymmetric_link_produces_mirrored_pair() {
        let session = test_session();
        let node = test_node(&session, 7);
        let net = test_network(&session, 100);

        let ifindex = node.new_netif(Some(&net), &[], None, None, None).unwrap();
        let iface = node.netif(ifindex).unwrap();
        let forward = LinkParams {
            delay: Some(Duration::from_millis(10)),
            ..LinkParams::default()
        };
        let reverse = LinkParams {
            delay: Some(Duration::from_millis(50)),
            ..LinkParams::default()
        };
        iface.set_params(forward.clone());
        iface.set_reverse_params(reverse.clone());

        let links = net.all_link_data(2);
        assert_eq!(links.len(), 2);

        let first = &links[0];
        assert_eq!((first.node1_id, first.node2_id), (100, 7));
        assert!(first.unidirectional);
        assert_eq!(first.message_type, 2);
        assert_eq!(first.params, forward);

        let second = &links[1];
        assert_eq!((second.node1_id, second.node2_id), (7, 100));
        assert!(second.unidirectional);
        assert_eq!(second.message_type, 0);
        assert_eq!(second.params, reverse);
        assert_eq!(second.iface2_id, None);
        assert_eq!(second.iface2_mac, None);
        assert_eq!(second.iface2_ip4, None);
    }

    #[test]
    fn linknet_links_two_networks_and_synthesis_skips_self() {
        let session = test_session();
        let net1 = test_network(&session, 100);
        let net2 = test_network(&session, 101);

        let iface = net1.linknet(&net2).unwrap();
        assert!(Arc::ptr_eq(&iface.net().unwrap(), &net1));
        assert!(Arc::ptr_eq(&iface.othernet().unwrap(), &net2));
        assert_eq!(
            iface.localname(),
            format!("veth64.65.{}", session.short_id()),
        );

        let links = net1.all_link_data(2);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].node1_id, 100);
        assert_eq!(links[0].node2_id, 101);

        // A self-link never produces a record.
        let looped = net1.linknet(&net1).unwrap();
        assert!(looped.othernet().is_some());
        assert_eq!(net1.all_link_data(2).len(), 1);
    }

    #[test]
    fn startup_is_exclusive_and_shutdown_idempotent() {
        let session = test_session();
        let net = test_network(&session, 100);
        assert!(!net.is_up());
        net.startup().unwrap();
        assert!(matches!(net.startup(), Err(Error::AlreadyUp(_))));
        assert!(net.shutdown().is_empty());
        assert!(!net.is_up());
        assert!(net.shutdown().is_empty());
        net.startup().unwrap();
        assert!(net.is_up());
    }

    #[test]
    fn node_data_suppressed_without_node_type() {
        let session = test_session();
        let exec = RecordingExecutor::new();
        let net = Network::new(
            session,
            NetworkOptions {
                id: Some(100),
                node_type: None,
                executor: Some(exec as Arc<dyn Executor>),
                ..NetworkOptions::default()
            },
        );
        assert!(net.data(1, None, None, None, None).is_none());
    }
}
