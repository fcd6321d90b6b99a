use crate::priv_prelude::*;

/// Interface provisioning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfaceKind {
    /// Paired virtual ethernet endpoint.
    Veth,
    /// Software tunnel device used for tap-backed networks. The kernel device
    /// is created externally and may appear asynchronously.
    TunTap,
}

struct IfaceState {
    name: String,
    localname: String,
    /// Whether the kernel device has been provisioned.
    up: bool,
    control: bool,
    hwaddr: Option<MacAddr>,
    addrs: Vec<IfaceAddr>,
    node: Weak<Node>,
    net: Weak<Network>,
    othernet: Weak<Network>,
    /// Index on the owning node.
    netindex: Option<u32>,
    /// Index on the attached network.
    netifi: Option<u32>,
    /// Kernel-assigned interface index inside the node's namespace.
    flow_id: Option<u32>,
    position: Position,
    forward: LinkParams,
    reverse: LinkParams,
}

/// An emulated network interface.
///
/// Created by a node (or by a network for network-to-network links) and shared
/// between the owner's registry and an attached network's registry. The owner
/// shuts the interface down before dropping its reference.
///
/// The internal lock is a leaf: no method takes another object's lock while
/// holding it.
pub struct Iface {
    kind: IfaceKind,
    net_client: Arc<dyn NetClient>,
    state: Mutex<IfaceState>,
}

impl Iface {
    pub(crate) fn new(
        kind: IfaceKind,
        net_client: Arc<dyn NetClient>,
        name: &str,
        localname: &str,
        up: bool,
        node: Weak<Node>,
    ) -> Arc<Iface> {
        Arc::new(Iface {
            kind,
            net_client,
            state: Mutex::new(IfaceState {
                name: name.to_owned(),
                localname: localname.to_owned(),
                up,
                control: false,
                hwaddr: None,
                addrs: Vec::new(),
                node,
                net: Weak::new(),
                othernet: Weak::new(),
                netindex: None,
                netifi: None,
                flow_id: None,
                position: Position::default(),
                forward: LinkParams::default(),
                reverse: LinkParams::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, IfaceState> {
        self.state.lock().unwrap()
    }

    pub fn kind(&self) -> IfaceKind {
        self.kind
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        self.lock().name = name.to_owned();
    }

    pub fn localname(&self) -> String {
        self.lock().localname.clone()
    }

    pub fn is_up(&self) -> bool {
        self.lock().up
    }

    /// Whether this is a control-network interface, excluded from
    /// `common_nets` unless explicitly requested.
    pub fn is_control(&self) -> bool {
        self.lock().control
    }

    pub fn set_control(&self, control: bool) {
        self.lock().control = control;
    }

    pub fn hwaddr(&self) -> Option<MacAddr> {
        self.lock().hwaddr
    }

    pub fn set_hwaddr(&self, hwaddr: MacAddr) {
        self.lock().hwaddr = Some(hwaddr);
    }

    pub fn addrs(&self) -> Vec<IfaceAddr> {
        self.lock().addrs.clone()
    }

    /// Record an address on the interface.
    pub fn add_addr(&self, addr: IfaceAddr) {
        self.lock().addrs.push(addr);
    }

    /// Remove a recorded address. Fails if the address is not present.
    pub fn del_addr(&self, addr: &IfaceAddr) -> Result<(), Error> {
        let mut state = self.lock();
        match state.addrs.iter().position(|have| have == addr) {
            Some(index) => {
                let _removed = state.addrs.remove(index);
                Ok(())
            }
            None => Err(Error::UnknownAddress {
                iface: state.name.clone(),
                addr: addr.to_string(),
            }),
        }
    }

    /// The node that owns this interface, if it is node-owned and still alive.
    pub fn node(&self) -> Option<Arc<Node>> {
        self.lock().node.upgrade()
    }

    /// The network this interface is attached to.
    pub fn net(&self) -> Option<Arc<Network>> {
        self.lock().net.upgrade()
    }

    /// For an interface linking two networks together, the far-end network.
    pub fn othernet(&self) -> Option<Arc<Network>> {
        self.lock().othernet.upgrade()
    }

    pub(crate) fn set_othernet(&self, net: &Arc<Network>) {
        self.lock().othernet = Arc::downgrade(net);
    }

    pub fn netindex(&self) -> Option<u32> {
        self.lock().netindex
    }

    pub(crate) fn set_netindex(&self, index: Option<u32>) {
        self.lock().netindex = index;
    }

    pub fn netifi(&self) -> Option<u32> {
        self.lock().netifi
    }

    pub(crate) fn set_attachment(&self, net: Weak<Network>, netifi: Option<u32>) {
        let mut state = self.lock();
        state.net = net;
        state.netifi = netifi;
    }

    pub fn flow_id(&self) -> Option<u32> {
        self.lock().flow_id
    }

    pub(crate) fn set_flow_id(&self, flow_id: u32) {
        self.lock().flow_id = Some(flow_id);
    }

    pub fn set_position(&self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> bool {
        self.lock().position.set(x, y, z)
    }

    pub fn position(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        self.lock().position.get()
    }

    /// Forward-direction emulation parameters.
    pub fn params(&self) -> LinkParams {
        self.lock().forward.clone()
    }

    pub fn set_params(&self, params: LinkParams) {
        self.lock().forward = params;
    }

    /// Reverse-direction ("upstream") emulation parameters.
    pub fn reverse_params(&self) -> LinkParams {
        self.lock().reverse.clone()
    }

    pub fn set_reverse_params(&self, params: LinkParams) {
        self.lock().reverse = params;
    }

    /// Whether forward and reverse parameters differ.
    pub fn is_asymmetric(&self) -> bool {
        let state = self.lock();
        state.forward != state.reverse
    }

    /// Tear down the kernel device, if one was provisioned: flush its
    /// addresses, then delete it. The in-memory record stays valid; the owner
    /// drops its reference afterwards.
    pub fn shutdown(&self) -> Result<(), Error> {
        let localname = {
            let mut state = self.lock();
            if !state.up {
                return Ok(());
            }
            state.up = false;
            state.localname.clone()
        };
        if let Err(err) = self.net_client.device_flush(&localname) {
            warn!("error flushing addresses on {}: {}", localname, err);
        }
        self.net_client.delete_device(&localname)
    }
}
