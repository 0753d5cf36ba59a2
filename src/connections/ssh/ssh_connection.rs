use log::{debug, error, info};
use ssh2::Session;
use std::io::{self, ErrorKind, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::connections::connection::{LazyHandle, Reconnect};
use crate::connections::errors::ConnectionError;
use crate::core::params::Params;
use crate::core::registry::Managed;

/// Where and how to log in, extracted from the manager parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub key_filename: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl SshTarget {
    /// `host` or `hostname` is mandatory; everything else has a default.
    pub fn from_params(params: &Params) -> Result<Self, ConnectionError> {
        let host = params
            .str_of(&["host", "hostname"])
            .ok_or_else(|| ConnectionError::Usage("ssh needs a `host` or `hostname` parameter".into()))?;
        let port = params.port_of(&["port"])?.unwrap_or(22);
        let username = params
            .str_of(&["username", "user"])
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "root".to_string());
        Ok(Self {
            host,
            port,
            username,
            password: params.str_of(&["password"]),
            key_filename: params.str_of(&["key_filename"]).map(PathBuf::from),
            timeout: params.millis_of(&["timeout"])?,
        })
    }
}

/// Output of a remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

/// A blocking, authenticated SSH session using the ssh2 library.
pub struct SshSession {
    target: SshTarget,
    session: Option<Session>,
}

impl SshSession {
    pub fn connect(target: SshTarget) -> Result<Self, ConnectionError> {
        let session = open_session(&target)?;
        Ok(Self {
            target,
            session: Some(session),
        })
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// The ssh2 session, for channels and SFTP.
    pub fn session(&self) -> Result<&Session, ConnectionError> {
        self.session.as_ref().ok_or(ConnectionError::NotConnected)
    }

    /// Run `command` on the remote host and collect its output.
    pub fn exec(&mut self, command: &str) -> Result<ExecOutput, ConnectionError> {
        let session = self.session()?;
        let mut channel = session.channel_session()?;
        channel.exec(command)?;

        // Nonblocking so a full stderr window can't stall the stdout read.
        session.set_blocking(false);
        let drained = drain_streams(&mut channel.stream(0), &mut channel.stderr(), || channel.eof());
        session.set_blocking(true);
        let (stdout, stderr) = drained?;

        channel.wait_close()?;
        let exit_status = channel.exit_status()?;

        debug!("ssh exec '{}' on {} exited with {}", command, self.target.host, exit_status);
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    pub fn disconnect(&mut self) -> Result<(), ConnectionError> {
        if let Some(session) = self.session.take() {
            session.disconnect(None, "closed by client", None)?;
            info!("SSH session to {} closed.", self.target.host);
        }
        Ok(())
    }
}

/// Read whatever is available into `sink`; `WouldBlock` counts as nothing.
fn read_available(reader: &mut impl Read, sink: &mut Vec<u8>) -> io::Result<usize> {
    let mut buffer = [0u8; 8192];
    match reader.read(&mut buffer) {
        Ok(n) => {
            sink.extend_from_slice(&buffer[..n]);
            Ok(n)
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

/// Alternate between two nonblocking streams until the remote side is done
/// and both are empty.
fn drain_streams(
    stdout: &mut impl Read,
    stderr: &mut impl Read,
    at_eof: impl Fn() -> bool,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let (mut out, mut err) = (Vec::new(), Vec::new());
    loop {
        let got = read_available(stdout, &mut out)? + read_available(stderr, &mut err)?;
        if got == 0 {
            if at_eof() {
                return Ok((out, err));
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Reconnect for SshSession {
    fn is_alive(&mut self) -> bool {
        match &self.session {
            Some(session) => session.authenticated() && session.keepalive_send().is_ok(),
            None => false,
        }
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.session = Some(open_session(&self.target)?);
        Ok(())
    }
}

fn open_session(target: &SshTarget) -> Result<Session, ConnectionError> {
    let address = format!("{}:{}", target.host, target.port);
    info!("Connecting to SSH server at {}", address);

    let tcp = match target.timeout {
        Some(timeout) => {
            let socket = address
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| ConnectionError::Other(format!("cannot resolve {}", address)))?;
            TcpStream::connect_timeout(&socket, timeout)?
        }
        None => TcpStream::connect(&address)?,
    };

    let mut session = Session::new()?;
    if let Some(timeout) = target.timeout {
        session.set_timeout(timeout.as_millis() as u32);
    }
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|e| {
        error!("Handshake error: {}", e);
        ConnectionError::from(e)
    })?;

    let auth = match (&target.key_filename, &target.password) {
        (Some(key), passphrase) => {
            session.userauth_pubkey_file(&target.username, None, key, passphrase.as_deref())
        }
        (None, Some(password)) => session.userauth_password(&target.username, password),
        (None, None) => session.userauth_agent(&target.username),
    };
    if let Err(e) = auth {
        error!("Authentication error: {}", e);
        return Err(e.into());
    }
    if !session.authenticated() {
        return Err(ConnectionError::Ssh("SSH authentication failed".into()));
    }

    info!("SSH connection established");
    Ok(session)
}

/// Memoized SSH session for one parameter set.
pub struct SshClientManager {
    params: Params,
    client: LazyHandle<SshSession>,
}

impl Managed for SshClientManager {
    fn new(params: Params) -> Self {
        Self {
            params,
            client: LazyHandle::new("ssh"),
        }
    }
}

impl SshClientManager {
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The connected session. Fails with a usage error before touching the
    /// network when no host was given.
    pub fn client(&mut self) -> Result<&mut SshSession, ConnectionError> {
        let target = SshTarget::from_params(&self.params)?;
        self.client
            .get_or_connect(&self.params, move |_| SshSession::connect(target), |_| Ok(()))
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn forced_close(&mut self) -> Result<(), ConnectionError> {
        match self.client.take() {
            Some(mut session) => session.disconnect(),
            None => Ok(()),
        }
    }
}
