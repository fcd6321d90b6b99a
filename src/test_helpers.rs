use crate::priv_prelude::*;

/// An [`Executor`] that records every command instead of running it.
///
/// Responses are matched by substring; unmatched commands succeed with empty
/// output. Failure injection also matches by substring and wins over canned
/// responses.
pub struct RecordingExecutor {
    commands: Mutex<Vec<String>>,
    responses: Mutex<Vec<(String, String)>>,
    failures: Mutex<Vec<String>>,
    puts: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<RecordingExecutor> {
        Arc::new(RecordingExecutor {
            commands: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
        })
    }

    /// Canned output for any command containing `needle`.
    pub fn respond(&self, needle: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((needle.to_owned(), output.to_owned()));
    }

    /// Make any command containing `needle` fail with exit status 1.
    pub fn fail_matching(&self, needle: &str) {
        self.failures.lock().unwrap().push(needle.to_owned());
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Files written via `put`/`put_temp`, as `(destination, contents)` pairs.
    pub fn puts(&self) -> Vec<(PathBuf, String)> {
        self.puts.lock().unwrap().clone()
    }
}

impl Executor for RecordingExecutor {
    fn run(&self, args: &str, _opts: &CmdOpts) -> Result<String, Error> {
        self.commands.lock().unwrap().push(args.to_owned());
        for needle in self.failures.lock().unwrap().iter() {
            if args.contains(needle.as_str()) {
                return Err(Error::Command(CmdError {
                    cmd: args.to_owned(),
                    status: Some(1),
                    output: String::new(),
                }));
            }
        }
        for (needle, output) in self.responses.lock().unwrap().iter() {
            if args.contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(String::new())
    }

    fn put(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        self.puts
            .lock()
            .unwrap()
            .push((dst.to_owned(), format!("<copy of {}>", src.display())));
        Ok(())
    }

    fn put_temp(&self, dst: &Path, contents: &str) -> Result<(), Error> {
        self.puts
            .lock()
            .unwrap()
            .push((dst.to_owned(), contents.to_owned()));
        Ok(())
    }
}

pub fn test_session() -> Arc<SessionContext> {
    SessionContext::new(0xbeef, "/tmp/netemu-test")
}

/// An interface not owned by any node or network, for registry-level tests.
pub fn loose_iface(session: &Arc<SessionContext>) -> Arc<Iface> {
    let exec = RecordingExecutor::new();
    let run: CmdRunner = Arc::new(move |args: &str| exec.run(args, &CmdOpts::default()));
    let net_client = get_net_client(false, run);
    let localname = format!("veth0.0.{}", session.short_id());
    Iface::new(
        IfaceKind::Veth,
        net_client,
        "eth0",
        &localname,
        false,
        Weak::new(),
    )
}
