pub mod ssh_connection;

pub use ssh_connection::{ExecOutput, SshClientManager, SshSession, SshTarget};
