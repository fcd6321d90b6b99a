use std::process::{Command, Stdio};

use crate::priv_prelude::*;

/// Options for running an external command.
#[derive(Debug, Clone)]
pub struct CmdOpts {
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// When `false` the command is detached and the call returns empty output.
    pub wait: bool,
    /// Run the command through `/bin/sh -c` instead of splitting it into argv.
    pub shell: bool,
}

impl Default for CmdOpts {
    fn default() -> CmdOpts {
        CmdOpts {
            env: Vec::new(),
            cwd: None,
            wait: true,
            shell: false,
        }
    }
}

impl CmdOpts {
    pub fn shell() -> CmdOpts {
        CmdOpts {
            shell: true,
            ..CmdOpts::default()
        }
    }

    pub fn detached() -> CmdOpts {
        CmdOpts {
            wait: false,
            ..CmdOpts::default()
        }
    }
}

/// Execution capability every OS-touching operation is routed through.
///
/// A node picks its executor once at construction, either [`LocalExecutor`] or a
/// [`DistributedServer`] proxy, and never branches on local-vs-remote anywhere else.
pub trait Executor: Send + Sync {
    /// Run a command and return its combined stdout and stderr.
    fn run(&self, args: &str, opts: &CmdOpts) -> Result<String, Error>;

    /// Copy a file to where this executor runs commands.
    fn put(&self, src: &Path, dst: &Path) -> Result<(), Error>;

    /// Materialize `contents` as a file at `dst` where this executor runs commands.
    fn put_temp(&self, dst: &Path, contents: &str) -> Result<(), Error>;

    /// Name of the remote server, `None` for local execution.
    fn server_name(&self) -> Option<&str> {
        None
    }
}

/// Runs commands on the local host with `std::process::Command`.
///
/// Control-plane commands carry no quoting, so non-shell commands are split on
/// whitespace into argv.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalExecutor;

impl LocalExecutor {
    fn command(&self, args: &str, opts: &CmdOpts) -> Result<Command, Error> {
        let mut cmd = if opts.shell {
            let mut cmd = Command::new("/bin/sh");
            cmd.arg("-c").arg(args);
            cmd
        } else {
            let mut words = args.split_whitespace();
            let program = words.next().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "empty command")
            })?;
            let mut cmd = Command::new(program);
            cmd.args(words);
            cmd
        };
        for (key, value) in &opts.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }
        Ok(cmd)
    }
}

impl Executor for LocalExecutor {
    fn run(&self, args: &str, opts: &CmdOpts) -> Result<String, Error> {
        debug!("cmd: {}", args);
        let mut cmd = self.command(args, opts)?;
        if !opts.wait {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            let _child = cmd.spawn()?;
            return Ok(String::new());
        }
        let output = cmd.output()?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_owned();
        if !output.status.success() {
            return Err(Error::Command(CmdError {
                cmd: args.to_owned(),
                status: output.status.code(),
                output: combined,
            }));
        }
        Ok(combined)
    }

    fn put(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        if let Some(dir) = dst.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let _bytes = std::fs::copy(src, dst)?;
        Ok(())
    }

    fn put_temp(&self, dst: &Path, contents: &str) -> Result<(), Error> {
        if let Some(dir) = dst.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(dst, contents)?;
        Ok(())
    }
}

/// A remote host commands are proxied to over `ssh`/`scp`.
///
/// Implements [`Executor`], so a node with a server affinity issues every command
/// through the same code path as a local node.
pub struct DistributedServer {
    name: String,
    host: String,
    local: LocalExecutor,
}

impl DistributedServer {
    pub fn new(name: &str, host: &str) -> Arc<DistributedServer> {
        Arc::new(DistributedServer {
            name: name.to_owned(),
            host: host.to_owned(),
            local: LocalExecutor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run a command on the remote host and return its combined output.
    pub fn remote_cmd(&self, args: &str, opts: &CmdOpts) -> Result<String, Error> {
        let mut remote = String::new();
        for (key, value) in &opts.env {
            remote.push_str(&format!("{}={} ", key, value));
        }
        if let Some(cwd) = &opts.cwd {
            remote.push_str(&format!("cd {} && ", cwd.display()));
        }
        if opts.shell {
            remote.push_str(&format!("/bin/sh -c '{}'", args));
        } else {
            remote.push_str(args);
        }
        let ssh = format!("ssh {} {}", self.host, remote);
        let local_opts = CmdOpts {
            wait: opts.wait,
            ..CmdOpts::default()
        };
        self.local.run(&ssh, &local_opts)
    }

    /// Copy a local file onto the remote host.
    pub fn remote_put(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        let scp = format!("scp {} {}:{}", src.display(), self.host, dst.display());
        let _output = self.local.run(&scp, &CmdOpts::default())?;
        Ok(())
    }

    /// Materialize `contents` into a temporary local file and push it to `dst`
    /// on the remote host.
    pub fn remote_put_temp(&self, dst: &Path, contents: &str) -> Result<(), Error> {
        let tmp = std::env::temp_dir().join(format!("netemu-put-{:016x}", rand::random::<u64>()));
        std::fs::write(&tmp, contents)?;
        let res = self.remote_put(&tmp, dst);
        if let Err(err) = std::fs::remove_file(&tmp) {
            warn!("failed to remove temp file {}: {}", tmp.display(), err);
        }
        res
    }
}

impl Executor for DistributedServer {
    fn run(&self, args: &str, opts: &CmdOpts) -> Result<String, Error> {
        self.remote_cmd(args, opts)
    }

    fn put(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        self.remote_put(src, dst)
    }

    fn put_temp(&self, dst: &Path, contents: &str) -> Result<(), Error> {
        self.remote_put_temp(dst, contents)
    }

    fn server_name(&self) -> Option<&str> {
        Some(&self.name)
    }
}
