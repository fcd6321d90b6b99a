use crate::priv_prelude::*;

/// Binary that launches a new namespace and prints the pid of the daemonized
/// process.
pub const VNODED_BIN: &str = "vnoded";
/// Binary used for bind mounts inside a node.
pub const MOUNT_BIN: &str = "mount";

const IF_NAMESIZE: usize = libc::IF_NAMESIZE as usize;

/// Construction options for a [`Node`]. Unset fields get session defaults.
#[derive(Default, Clone)]
pub struct NodeOptions {
    pub id: Option<u32>,
    pub name: Option<String>,
    /// Private node directory. Created under the session directory and removed
    /// on shutdown when not supplied.
    pub nodedir: Option<PathBuf>,
    /// Remote server this node runs on. `None` means the local host.
    pub server: Option<Arc<DistributedServer>>,
    /// Override the command executor. Defaults to the server when one is set,
    /// otherwise local execution.
    pub executor: Option<Arc<dyn Executor>>,
    pub model: Option<String>,
    pub canvas: Option<u32>,
    pub icon: Option<String>,
    pub opaque: Option<String>,
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Up,
    Down,
}

struct NodeState {
    lifecycle: Lifecycle,
    nodedir: Option<PathBuf>,
    tmp_nodedir: bool,
    pid: Option<u32>,
    client: Option<Arc<NamespaceClient>>,
    node_net: Option<Arc<dyn NetClient>>,
    mounts: Vec<(PathBuf, PathBuf)>,
    ifaces: IfaceMap,
    position: Position,
}

/// A namespace-backed emulated host.
///
/// Drives the `CREATED → UP → DOWN` lifecycle: [`startup`](Node::startup)
/// launches the external namespace daemon and the control-channel client,
/// [`shutdown`](Node::shutdown) tears everything down best-effort. Interface
/// provisioning ([`new_veth`](Node::new_veth), [`new_tuntap`](Node::new_tuntap),
/// [`new_netif`](Node::new_netif)) allocates indices, creates kernel devices
/// when the node is up and attaches interfaces to networks.
///
/// The internal lock guards the interface map, mount list, lifecycle flag and
/// index counter. It is acquired once at each public entry point; inner helpers
/// take the already-locked state, so nested calls never re-acquire.
pub struct Node {
    core: ObjectCore,
    // Self-handle for hanging Weak back-references off created interfaces.
    weak: Weak<Node>,
    session: Arc<SessionContext>,
    server: Option<Arc<DistributedServer>>,
    executor: Arc<dyn Executor>,
    host_net: Arc<dyn NetClient>,
    ctrl_path: PathBuf,
    state: Mutex<NodeState>,
}

impl Node {
    pub fn new(session: Arc<SessionContext>, opts: NodeOptions) -> Arc<Node> {
        let id = opts.id.unwrap_or_else(|| session.next_node_id());
        let name = opts.name.unwrap_or_else(|| format!("n{}", id));
        let executor = opts.executor.unwrap_or_else(|| match &opts.server {
            Some(server) => server.clone() as Arc<dyn Executor>,
            None => Arc::new(LocalExecutor),
        });
        let exec = executor.clone();
        let run: CmdRunner = Arc::new(move |args: &str| exec.run(args, &CmdOpts::default()));
        let host_net = get_net_client(session.options().use_ovs, run);
        let ctrl_path = session.session_dir().join(&name);
        let core = ObjectCore {
            id,
            name,
            node_type: Some(NodeType::Default),
            model: opts.model,
            canvas: opts.canvas,
            icon: opts.icon,
            opaque: opts.opaque,
            services: opts.services,
            server: executor.server_name().map(str::to_owned),
        };
        Arc::new_cyclic(|weak| Node {
            core,
            weak: weak.clone(),
            session,
            server: opts.server,
            executor,
            host_net,
            ctrl_path,
            state: Mutex::new(NodeState {
                lifecycle: Lifecycle::Created,
                nodedir: opts.nodedir,
                tmp_nodedir: false,
                pid: None,
                client: None,
                node_net: None,
                mounts: Vec::new(),
                ifaces: IfaceMap::new(),
                position: Position::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap()
    }

    pub fn is_up(&self) -> bool {
        self.lock().lifecycle == Lifecycle::Up
    }

    pub fn pid(&self) -> Option<u32> {
        self.lock().pid
    }

    pub fn nodedir(&self) -> Option<PathBuf> {
        self.lock().nodedir.clone()
    }

    pub fn mounts(&self) -> Vec<(PathBuf, PathBuf)> {
        self.lock().mounts.clone()
    }

    pub fn ctrl_path(&self) -> &Path {
        &self.ctrl_path
    }

    /// Run a command on the host (or remote server) this node lives on.
    pub fn host_cmd(&self, args: &str, opts: &CmdOpts) -> Result<String, Error> {
        self.executor.run(args, opts)
    }

    /// Run a command inside the node's namespace via its control channel.
    pub fn cmd(&self, args: &str, wait: bool, shell: bool) -> Result<String, Error> {
        let state = self.lock();
        self.cmd_locked(&state, args, wait, shell)
    }

    fn cmd_locked(
        &self,
        state: &NodeState,
        args: &str,
        wait: bool,
        shell: bool,
    ) -> Result<String, Error> {
        let client = state
            .client
            .as_ref()
            .ok_or_else(|| Error::NotStarted(self.core.name.clone()))?;
        client.check_cmd(args, wait, shell)
    }

    fn node_net_locked(&self, state: &NodeState) -> Result<Arc<dyn NetClient>, Error> {
        state
            .node_net
            .clone()
            .ok_or_else(|| Error::NotStarted(self.core.name.clone()))
    }

    /// Probe whether the backing process is alive.
    pub fn alive(&self) -> bool {
        let pid = self.lock().pid;
        match pid {
            Some(pid) => self
                .executor
                .run(&format!("kill -0 {}", pid), &CmdOpts::default())
                .is_ok(),
            None => false,
        }
    }

    /// Launch the namespace daemon, connect the control channel, bring up
    /// loopback, set the hostname and create the private `/var/run` and
    /// `/var/log` directories.
    ///
    /// Fails on an already-up node. A failure part-way leaves the node
    /// partially constructed; the caller shuts it down explicitly.
    pub fn startup(&self) -> Result<(), Error> {
        let mut state = self.lock();
        match state.lifecycle {
            Lifecycle::Up => return Err(Error::AlreadyUp(self.core.name.clone())),
            Lifecycle::Down => return Err(Error::NodeDown(self.core.name.clone())),
            Lifecycle::Created => {}
        }
        self.make_node_dir(&mut state)?;

        let ctrl = self.ctrl_path.display();
        let mut vnoded = format!(
            "{} -v -c {} -l {}.log -p {}.pid",
            VNODED_BIN, ctrl, ctrl, ctrl,
        );
        if let Some(nodedir) = &state.nodedir {
            vnoded.push_str(&format!(" -C {}", nodedir.display()));
        }
        let mut env = self.session.environment();
        env.push(("NODE_NUMBER".to_owned(), self.core.id.to_string()));
        env.push(("NODE_NAME".to_owned(), self.core.name.clone()));
        let opts = CmdOpts {
            env,
            ..CmdOpts::default()
        };
        let output = self.executor.run(&vnoded, &opts)?;
        let pid = output
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::UnexpectedOutput {
                cmd: vnoded,
                output: output.clone(),
            })?;
        debug!("node({}) pid: {}", self.core.name, pid);
        state.pid = Some(pid);

        let client = NamespaceClient::new(
            &self.core.name,
            self.ctrl_path.clone(),
            self.executor.clone(),
        );
        let runner = client.clone();
        let run: CmdRunner = Arc::new(move |args: &str| runner.check_cmd(args, true, false));
        let node_net = get_net_client(self.session.options().use_ovs, run);

        debug!("node({}) bringing up loopback interface", self.core.name);
        node_net.device_up("lo")?;
        debug!("node({}) setting hostname", self.core.name);
        node_net.set_hostname(&self.core.name)?;

        state.client = Some(client);
        state.node_net = Some(node_net);
        state.lifecycle = Lifecycle::Up;

        self.private_dir_locked(&mut state, "/var/run")?;
        self.private_dir_locked(&mut state, "/var/log")?;
        info!("node({}) started, pid {}", self.core.name, pid);
        Ok(())
    }

    /// Tear the node down. A no-op unless the node is up.
    ///
    /// Every cleanup step runs even when earlier steps fail; non-fatal failures
    /// are logged and returned instead of raised, so callers can always free a
    /// node. An empty return means a clean teardown.
    pub fn shutdown(&self) -> Vec<Error> {
        let mut state = self.lock();
        if state.lifecycle != Lifecycle::Up {
            return Vec::new();
        }
        let mut failures = Vec::new();

        // Bind mounts die with the namespace; only the bookkeeping is cleared.
        state.mounts.clear();

        for iface in state.ifaces.values(false) {
            if let Err(err) = iface.shutdown() {
                warn!(
                    "node({}) error shutting down interface {}: {}",
                    self.core.name,
                    iface.name(),
                    err,
                );
                failures.push(err);
            }
        }

        if let Some(pid) = state.pid {
            if let Err(err) = self
                .executor
                .run(&format!("kill -9 {}", pid), &CmdOpts::default())
            {
                warn!("node({}) error killing process: {}", self.core.name, err);
                failures.push(err);
            }
        }

        let ctrl = self.ctrl_path.display();
        if let Err(err) = self.executor.run(
            &format!("rm -rf {} {}.log {}.pid", ctrl, ctrl, ctrl),
            &CmdOpts::default(),
        ) {
            warn!(
                "node({}) error removing control channel files: {}",
                self.core.name, err,
            );
            failures.push(err);
        }

        state.ifaces.clear();
        if let Some(client) = state.client.take() {
            client.close();
        }
        state.node_net = None;
        state.pid = None;
        state.lifecycle = Lifecycle::Down;

        if let Err(err) = self.rm_node_dir(&mut state) {
            warn!(
                "node({}) error removing node directory: {}",
                self.core.name, err,
            );
            failures.push(err);
        }
        info!("node({}) shut down", self.core.name);
        failures
    }

    fn make_node_dir(&self, state: &mut NodeState) -> Result<(), Error> {
        if state.nodedir.is_none() {
            let nodedir = self
                .session
                .session_dir()
                .join(format!("{}.conf", self.core.name));
            let _output = self.executor.run(
                &format!("mkdir -p {}", nodedir.display()),
                &CmdOpts::default(),
            )?;
            state.nodedir = Some(nodedir);
            state.tmp_nodedir = true;
        } else {
            state.tmp_nodedir = false;
        }
        Ok(())
    }

    fn rm_node_dir(&self, state: &mut NodeState) -> Result<(), Error> {
        if self.session.options().preserve_dirs {
            return Ok(());
        }
        if state.tmp_nodedir {
            if let Some(nodedir) = &state.nodedir {
                let _output = self.executor.run(
                    &format!("rm -rf {}", nodedir.display()),
                    &CmdOpts::default(),
                )?;
            }
        }
        Ok(())
    }

    /// A command string that opens a shell inside this node's control channel,
    /// wrapped for `ssh -X` when the node runs remotely.
    pub fn term_cmd(&self, sh: &str) -> Result<String, Error> {
        let state = self.lock();
        let client = state
            .client
            .as_ref()
            .ok_or_else(|| Error::NotStarted(self.core.name.clone()))?;
        let terminal = client.create_cmd(sh);
        Ok(match &self.server {
            Some(server) => format!("ssh -X -f {} xterm -e {}", server.host(), terminal),
            None => terminal,
        })
    }

    /// Register an already-created interface at `ifindex`.
    pub fn add_netif(&self, iface: &Arc<Iface>, ifindex: u32) -> Result<(), Error> {
        let mut state = self.lock();
        state.ifaces.insert(ifindex, iface.clone())?;
        iface.set_netindex(Some(ifindex));
        Ok(())
    }

    /// Remove and shut down the interface at `ifindex`.
    pub fn del_netif(&self, ifindex: u32) -> Result<(), Error> {
        let mut state = self.lock();
        let iface = state.ifaces.remove(ifindex)?;
        iface.set_netindex(None);
        if let Err(err) = iface.shutdown() {
            warn!(
                "node({}) error shutting down interface {}: {}",
                self.core.name,
                iface.name(),
                err,
            );
        }
        Ok(())
    }

    pub fn netif(&self, ifindex: u32) -> Option<Arc<Iface>> {
        self.lock().ifaces.get(ifindex)
    }

    /// Attach the interface at `ifindex` to a network.
    pub fn attach_net(&self, ifindex: u32, net: &Arc<Network>) -> Result<(), Error> {
        let iface = self
            .netif(ifindex)
            .ok_or(Error::UnknownIfindex(ifindex))?;
        let _net_index = net.attach(&iface);
        Ok(())
    }

    /// Detach the interface at `ifindex` from its network.
    pub fn detach_net(&self, ifindex: u32) -> Result<(), Error> {
        let iface = self
            .netif(ifindex)
            .ok_or(Error::UnknownIfindex(ifindex))?;
        match iface.net() {
            Some(net) => net.detach(&iface),
            None => {
                warn!(
                    "node({}) interface {} is not attached to a network",
                    self.core.name, ifindex,
                );
                Ok(())
            }
        }
    }

    /// Create a new veth interface. When the node is up the peer end is moved
    /// into the namespace, renamed, has checksum offload disabled and its
    /// kernel flow index recorded.
    ///
    /// Generated names must fit the kernel limit; a violation fails before any
    /// interface is created or any index consumed.
    pub fn new_veth(
        &self,
        ifindex: Option<u32>,
        ifname: Option<&str>,
    ) -> Result<u32, Error> {
        let mut state = self.lock();
        self.new_veth_locked(&mut state, ifindex, ifname)
    }

    fn new_veth_locked(
        &self,
        state: &mut NodeState,
        ifindex: Option<u32>,
        ifname: Option<&str>,
    ) -> Result<u32, Error> {
        let index = match ifindex {
            Some(index) => index,
            None => state.ifaces.next_free(),
        };
        let ifname = match ifname {
            Some(ifname) => ifname.to_owned(),
            None => format!("eth{}", index),
        };
        let sessionid = self.session.short_id();
        let localname = format!("veth{:x}.{}.{}", self.core.id, index, sessionid);
        if localname.len() >= IF_NAMESIZE {
            return Err(Error::NameTooLong(localname));
        }
        let peer_name = format!("{}p", localname);
        if peer_name.len() >= IF_NAMESIZE {
            return Err(Error::NameTooLong(peer_name));
        }
        if ifname.len() >= IF_NAMESIZE {
            return Err(Error::NameTooLong(ifname));
        }

        let up = state.lifecycle == Lifecycle::Up;
        let iface = Iface::new(
            IfaceKind::Veth,
            self.host_net.clone(),
            &peer_name,
            &localname,
            up,
            self.weak.clone(),
        );

        if up {
            let node_net = self.node_net_locked(state)?;
            let pid = state
                .pid
                .ok_or_else(|| Error::NotStarted(self.core.name.clone()))?;
            self.host_net.create_veth(&localname, &peer_name)?;
            self.host_net.device_up(&localname)?;
            self.host_net.device_ns(&peer_name, pid)?;
            node_net.device_name(&peer_name, &ifname)?;
            node_net.checksums_off(&ifname)?;
            iface.set_name(&ifname);
            let flow_id = node_net.get_ifindex(&ifname)?;
            iface.set_flow_id(flow_id);
            debug!("interface flow index: {} - {}", ifname, flow_id);
        } else {
            iface.set_name(&ifname);
        }

        let index = match ifindex {
            Some(index) => index,
            None => state.ifaces.alloc(),
        };
        match state.ifaces.insert(index, iface.clone()) {
            Ok(()) => {
                iface.set_netindex(Some(index));
                Ok(index)
            }
            Err(err) => {
                // Never leave an orphaned kernel device behind.
                if let Err(shutdown_err) = iface.shutdown() {
                    warn!(
                        "node({}) error discarding interface {}: {}",
                        self.core.name,
                        iface.name(),
                        shutdown_err,
                    );
                }
                Err(err)
            }
        }
    }

    /// Create a new tunnel-tap interface. The kernel device is provisioned
    /// externally and may appear asynchronously, so no device commands are
    /// issued here.
    pub fn new_tuntap(
        &self,
        ifindex: Option<u32>,
        ifname: Option<&str>,
    ) -> Result<u32, Error> {
        let mut state = self.lock();
        self.new_tuntap_locked(&mut state, ifindex, ifname)
    }

    fn new_tuntap_locked(
        &self,
        state: &mut NodeState,
        ifindex: Option<u32>,
        ifname: Option<&str>,
    ) -> Result<u32, Error> {
        let index = match ifindex {
            Some(index) => index,
            None => state.ifaces.next_free(),
        };
        let ifname = match ifname {
            Some(ifname) => ifname.to_owned(),
            None => format!("eth{}", index),
        };
        let sessionid = self.session.short_id();
        let localname = format!("tap{}.{}.{}", self.core.id, index, sessionid);
        if localname.len() >= IF_NAMESIZE {
            return Err(Error::NameTooLong(localname));
        }
        if ifname.len() >= IF_NAMESIZE {
            return Err(Error::NameTooLong(ifname));
        }

        let up = state.lifecycle == Lifecycle::Up;
        let iface = Iface::new(
            IfaceKind::TunTap,
            self.host_net.clone(),
            &ifname,
            &localname,
            up,
            self.weak.clone(),
        );

        let index = match ifindex {
            Some(index) => index,
            None => state.ifaces.alloc(),
        };
        match state.ifaces.insert(index, iface.clone()) {
            Ok(()) => {
                iface.set_netindex(Some(index));
                Ok(index)
            }
            Err(err) => {
                if let Err(shutdown_err) = iface.shutdown() {
                    warn!(
                        "node({}) error discarding interface {}: {}",
                        self.core.name,
                        iface.name(),
                        shutdown_err,
                    );
                }
                Err(err)
            }
        }
    }

    /// Create a new network interface: provision it, attach it to `net`, apply
    /// the hardware address, then the IP addresses, then bring it up.
    ///
    /// Tap-backed networks take the tunnel-tap path, where addressing is only
    /// recorded on the interface since the device may not exist yet.
    pub fn new_netif(
        &self,
        net: Option<&Arc<Network>>,
        addrs: &[IfaceAddr],
        hwaddr: Option<MacAddr>,
        ifindex: Option<u32>,
        ifname: Option<&str>,
    ) -> Result<u32, Error> {
        let mut state = self.lock();
        if let Some(net) = net {
            if net.is_tap_backed() {
                let index = self.new_tuntap_locked(&mut state, ifindex, ifname)?;
                let iface = state
                    .ifaces
                    .get(index)
                    .ok_or(Error::UnknownIfindex(index))?;
                let _net_index = net.attach(&iface);
                if let Some(hwaddr) = hwaddr {
                    iface.set_hwaddr(hwaddr);
                }
                for addr in addrs {
                    iface.add_addr(*addr);
                }
                return Ok(index);
            }
        }

        let index = self.new_veth_locked(&mut state, ifindex, ifname)?;
        if let Some(net) = net {
            let iface = state
                .ifaces
                .get(index)
                .ok_or(Error::UnknownIfindex(index))?;
            let _net_index = net.attach(&iface);
        }
        if let Some(hwaddr) = hwaddr {
            self.set_hwaddr_locked(&state, index, hwaddr)?;
        }
        for addr in addrs {
            self.add_addr_locked(&state, index, *addr)?;
        }
        self.ifup_locked(&state, index)?;
        Ok(index)
    }

    /// Set the hardware address of the interface at `ifindex`, issuing the
    /// device command when the node is up.
    pub fn set_hwaddr(&self, ifindex: u32, hwaddr: MacAddr) -> Result<(), Error> {
        let state = self.lock();
        self.set_hwaddr_locked(&state, ifindex, hwaddr)
    }

    fn set_hwaddr_locked(
        &self,
        state: &NodeState,
        ifindex: u32,
        hwaddr: MacAddr,
    ) -> Result<(), Error> {
        let iface = state
            .ifaces
            .get(ifindex)
            .ok_or(Error::UnknownIfindex(ifindex))?;
        iface.set_hwaddr(hwaddr);
        if state.lifecycle == Lifecycle::Up {
            let node_net = self.node_net_locked(state)?;
            node_net.device_mac(&iface.name(), &hwaddr)?;
        }
        Ok(())
    }

    /// Add an address to the interface at `ifindex`, issuing the device command
    /// when the node is up. IPv4 addresses get a `+` broadcast hint.
    pub fn add_addr(&self, ifindex: u32, addr: IfaceAddr) -> Result<(), Error> {
        let state = self.lock();
        self.add_addr_locked(&state, ifindex, addr)
    }

    fn add_addr_locked(&self, state: &NodeState, ifindex: u32, addr: IfaceAddr) -> Result<(), Error> {
        let iface = state
            .ifaces
            .get(ifindex)
            .ok_or(Error::UnknownIfindex(ifindex))?;
        iface.add_addr(addr);
        if state.lifecycle == Lifecycle::Up {
            let node_net = self.node_net_locked(state)?;
            let broadcast = if addr.is_ipv4() { Some("+") } else { None };
            node_net.create_address(&iface.name(), &addr.to_string(), broadcast)?;
        }
        Ok(())
    }

    /// Delete an address from the interface at `ifindex`. Deleting an address
    /// that was never recorded logs and continues.
    pub fn del_addr(&self, ifindex: u32, addr: IfaceAddr) -> Result<(), Error> {
        let state = self.lock();
        let iface = state
            .ifaces
            .get(ifindex)
            .ok_or(Error::UnknownIfindex(ifindex))?;
        if let Err(err) = iface.del_addr(&addr) {
            warn!("node({}) {}", self.core.name, err);
        }
        if state.lifecycle == Lifecycle::Up {
            let node_net = self.node_net_locked(&state)?;
            node_net.delete_address(&iface.name(), &addr.to_string())?;
        }
        Ok(())
    }

    /// Bring the interface at `ifindex` administratively up. A no-op unless the
    /// node is up.
    pub fn ifup(&self, ifindex: u32) -> Result<(), Error> {
        let state = self.lock();
        self.ifup_locked(&state, ifindex)
    }

    fn ifup_locked(&self, state: &NodeState, ifindex: u32) -> Result<(), Error> {
        if state.lifecycle != Lifecycle::Up {
            return Ok(());
        }
        let iface = state
            .ifaces
            .get(ifindex)
            .ok_or(Error::UnknownIfindex(ifindex))?;
        let node_net = self.node_net_locked(state)?;
        node_net.device_up(&iface.name())
    }

    /// Create a private directory inside the node, bind-mounted from the node
    /// directory. The path must be absolute.
    pub fn private_dir(&self, path: &str) -> Result<(), Error> {
        let mut state = self.lock();
        self.private_dir_locked(&mut state, path)
    }

    fn private_dir_locked(&self, state: &mut NodeState, path: &str) -> Result<(), Error> {
        if !path.starts_with('/') {
            return Err(Error::PathNotAbsolute(path.to_owned()));
        }
        let nodedir = state
            .nodedir
            .clone()
            .ok_or_else(|| Error::NotStarted(self.core.name.clone()))?;
        let host_path = nodedir.join(path.trim_matches('/').replace('/', "."));
        let _output = self.executor.run(
            &format!("mkdir -p {}", host_path.display()),
            &CmdOpts::default(),
        )?;
        self.mount_locked(state, &host_path, Path::new(path))
    }

    /// Bind-mount a host directory at `target` inside the node.
    pub fn mount(&self, source: &Path, target: &Path) -> Result<(), Error> {
        let mut state = self.lock();
        self.mount_locked(&mut state, source, target)
    }

    fn mount_locked(&self, state: &mut NodeState, source: &Path, target: &Path) -> Result<(), Error> {
        debug!(
            "node({}) mounting: {} at {}",
            self.core.name,
            source.display(),
            target.display(),
        );
        self.cmd_locked(state, &format!("mkdir -p {}", target.display()), true, false)?;
        self.cmd_locked(
            state,
            &format!("{} -n --bind {} {}", MOUNT_BIN, source.display(), target.display()),
            true,
            false,
        )?;
        state.mounts.push((source.to_owned(), target.to_owned()));
        Ok(())
    }

    /// Host-side path backing an absolute in-node file path: the directory part
    /// has its separators folded to dots under the node directory.
    pub fn host_filename(&self, filename: &str) -> Result<PathBuf, Error> {
        let state = self.lock();
        self.host_filename_locked(&state, filename)
    }

    fn host_filename_locked(&self, state: &NodeState, filename: &str) -> Result<PathBuf, Error> {
        if !filename.starts_with('/') {
            return Err(Error::PathNotAbsolute(filename.to_owned()));
        }
        let (dirname, basename) = match filename.rsplit_once('/') {
            Some((dirname, basename)) if !basename.is_empty() => (dirname, basename),
            _ => {
                return Err(Error::PathNotAbsolute(filename.to_owned()));
            }
        };
        let nodedir = state
            .nodedir
            .clone()
            .ok_or_else(|| Error::NotStarted(self.core.name.clone()))?;
        let dirname = dirname.trim_start_matches('/').replace('/', ".");
        Ok(nodedir.join(dirname).join(basename))
    }

    /// Create a file inside the node's view with the given contents and mode.
    pub fn node_file(&self, filename: &str, contents: &str, mode: u32) -> Result<(), Error> {
        let state = self.lock();
        let host_path = self.host_filename_locked(&state, filename)?;
        if let Some(dirname) = host_path.parent() {
            let _output = self.executor.run(
                &format!("mkdir -m {:o} -p {}", 0o755, dirname.display()),
                &CmdOpts::default(),
            )?;
        }
        self.executor.put_temp(&host_path, contents)?;
        let _output = self.executor.run(
            &format!("chmod {:o} {}", mode, host_path.display()),
            &CmdOpts::default(),
        )?;
        debug!(
            "node({}) added file: {} mode: 0{:o}",
            self.core.name,
            host_path.display(),
            mode,
        );
        Ok(())
    }

    /// Copy a file into the node's view, optionally changing its mode.
    pub fn node_file_copy(
        &self,
        filename: &str,
        src: &Path,
        mode: Option<u32>,
    ) -> Result<(), Error> {
        let state = self.lock();
        let host_path = self.host_filename_locked(&state, filename)?;
        if let Some(dirname) = host_path.parent() {
            let _output = self.executor.run(
                &format!("mkdir -p {}", dirname.display()),
                &CmdOpts::default(),
            )?;
        }
        self.executor.put(src, &host_path)?;
        if let Some(mode) = mode {
            let _output = self.executor.run(
                &format!("chmod {:o} {}", mode, host_path.display()),
                &CmdOpts::default(),
            )?;
        }
        info!(
            "node({}) copied file: {} mode: {:?}",
            self.core.name,
            host_path.display(),
            mode,
        );
        Ok(())
    }

    /// Move a host-side file to an absolute path inside the running node.
    pub fn add_file(&self, src: &Path, filename: &str) -> Result<(), Error> {
        info!("adding file from {} to {}", src.display(), filename);
        if !filename.starts_with('/') {
            return Err(Error::PathNotAbsolute(filename.to_owned()));
        }
        let dirname = Path::new(filename)
            .parent()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "/".to_owned());
        let state = self.lock();
        match &self.server {
            None => {
                self.cmd_locked(&state, &format!("mkdir -p {}", dirname), true, false)?;
                self.cmd_locked(
                    &state,
                    &format!("mv {} {}", src.display(), filename),
                    true,
                    false,
                )?;
                self.cmd_locked(&state, "sync", true, false)?;
                Ok(())
            }
            Some(_server) => {
                let _output = self
                    .executor
                    .run(&format!("mkdir -p {}", dirname), &CmdOpts::default())?;
                self.executor.put(src, Path::new(filename))
            }
        }
    }

    /// Every `(network, iface1, iface2)` triple where an interface of this node
    /// and an interface of `other` share a network. Control-network interfaces
    /// are excluded unless `want_ctrl` is set.
    pub fn common_nets(
        &self,
        other: &dyn NodeObject,
        want_ctrl: bool,
    ) -> Vec<(Arc<Network>, Arc<Iface>, Arc<Iface>)> {
        let mut common = Vec::new();
        for iface1 in self.netifs(false) {
            if !want_ctrl && iface1.is_control() {
                continue;
            }
            let net1 = match iface1.net() {
                Some(net) => net,
                None => continue,
            };
            for iface2 in other.netifs(false) {
                if let Some(net2) = iface2.net() {
                    if Arc::ptr_eq(&net1, &net2) {
                        common.push((net1.clone(), iface1.clone(), iface2));
                    }
                }
            }
        }
        common
    }
}

impl NodeObject for Node {
    fn id(&self) -> u32 {
        self.core.id
    }

    fn name(&self) -> &str {
        &self.core.name
    }

    fn set_position(&self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> bool {
        let mut state = self.lock();
        let changed = state.position.set(x, y, z);
        if changed {
            for iface in state.ifaces.values(true) {
                let _changed = iface.set_position(x, y, z);
            }
        }
        changed
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
}
