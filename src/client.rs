use crate::priv_prelude::*;

/// Binary that executes a command inside a node's control channel.
pub const VCMD_BIN: &str = "vcmd";

/// Client for issuing commands over the control channel of a running
/// namespace-backed node.
///
/// The client only formats commands; execution goes through the node's
/// [`Executor`], so the channel works identically for local and remote nodes.
pub struct NamespaceClient {
    name: String,
    ctrl_path: PathBuf,
    executor: Arc<dyn Executor>,
    closed: AtomicBool,
}

impl NamespaceClient {
    pub fn new(
        name: &str,
        ctrl_path: impl Into<PathBuf>,
        executor: Arc<dyn Executor>,
    ) -> Arc<NamespaceClient> {
        Arc::new(NamespaceClient {
            name: name.to_owned(),
            ctrl_path: ctrl_path.into(),
            executor,
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connected(&self) -> bool {
        !self.closed.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Wrap `args` to run inside this node's control channel.
    pub fn create_cmd(&self, args: &str) -> String {
        format!("{} -c {} -- {}", VCMD_BIN, self.ctrl_path.display(), args)
    }

    /// Run a command inside the node and return its combined output.
    pub fn check_cmd(&self, args: &str, wait: bool, shell: bool) -> Result<String, Error> {
        if !self.connected() {
            return Err(Error::NotConnected(self.name.clone()));
        }
        let args = self.create_cmd(args);
        let opts = CmdOpts {
            wait,
            shell,
            ..CmdOpts::default()
        };
        self.executor.run(&args, &opts)
    }
}
