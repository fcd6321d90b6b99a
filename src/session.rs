use crate::priv_prelude::*;

/// Session-wide toggles consumed by nodes and networks.
#[derive(Debug, Default, Clone)]
pub struct SessionOptions {
    /// Select the software-switch net-client family instead of plain Linux commands.
    pub use_ovs: bool,
    /// Keep node directories on shutdown instead of removing them.
    pub preserve_dirs: bool,
}

/// Thin session context shared by every topology object.
///
/// The full session/orchestrator lives outside this crate; objects only need the
/// session id, the session directory, a node-id allocator and a few options.
pub struct SessionContext {
    id: u32,
    session_dir: PathBuf,
    next_node_id: AtomicU32,
    options: SessionOptions,
}

impl SessionContext {
    pub fn new(id: u32, session_dir: impl Into<PathBuf>) -> Arc<SessionContext> {
        SessionContext::with_options(id, session_dir, SessionOptions::default())
    }

    pub fn with_options(
        id: u32,
        session_dir: impl Into<PathBuf>,
        options: SessionOptions,
    ) -> Arc<SessionContext> {
        Arc::new(SessionContext {
            id,
            session_dir: session_dir.into(),
            next_node_id: AtomicU32::new(1),
            options,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Session id folded to 8 bits, used in generated interface names to keep
    /// them under the kernel name-length limit.
    pub fn short_id(&self) -> String {
        let folded = (self.id >> 8) ^ (self.id & 0xff);
        format!("{:x}", folded)
    }

    /// Allocate the next node id.
    pub fn next_node_id(&self) -> u32 {
        self.next_node_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Environment variables identifying the session, passed to the namespace
    /// launcher.
    pub fn environment(&self) -> Vec<(String, String)> {
        vec![
            ("SESSION".to_owned(), self.id.to_string()),
            ("SESSION_SHORT".to_owned(), self.short_id()),
            (
                "SESSION_DIR".to_owned(),
                self.session_dir.display().to_string(),
            ),
        ]
    }
}
