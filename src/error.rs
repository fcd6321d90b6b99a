use std::io;

use thiserror::Error;

/// An external command exited with a non-zero status.
///
/// Carries the command line, the exit status (`None` when the process was
/// killed by a signal) and the combined stdout/stderr output.
#[derive(Debug, Clone, Error)]
#[error("command `{cmd}` failed with status {status:?}: {output}")]
pub struct CmdError {
    pub cmd: String,
    pub status: Option<i32>,
    pub output: String,
}

/// Errors produced by the control plane.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Command(#[from] CmdError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("ifindex {0} already in use")]
    DuplicateIfindex(u32),
    #[error("ifindex {0} does not exist")]
    UnknownIfindex(u32),
    #[error("node {0} is already up")]
    AlreadyUp(String),
    #[error("node {0} has been shut down")]
    NodeDown(String),
    #[error("node {0} is not up")]
    NotStarted(String),
    #[error("interface name too long: {0}")]
    NameTooLong(String),
    #[error("path not fully qualified: {0}")]
    PathNotAbsolute(String),
    #[error("address {addr} not present on interface {iface}")]
    UnknownAddress { iface: String, addr: String },
    #[error("invalid interface address: {0}")]
    InvalidAddress(String),
    #[error("invalid mac address: {0}")]
    InvalidMac(String),
    #[error("control channel for {0} is closed")]
    NotConnected(String),
    #[error("unexpected output from `{cmd}`: {output:?}")]
    UnexpectedOutput { cmd: String, output: String },
}
