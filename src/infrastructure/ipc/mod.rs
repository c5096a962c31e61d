//! Local IPC transport: length-delimited JSON frames over a Unix socket
//! or Windows named pipe (spec §4.7).

pub mod protocol;
pub mod server;

pub use protocol::{Command, IpcHandler, IpcReply, IpcRequest, ReplyStatus};
