//! Remote sessions over OpenSSH control masters.
//!
//! Connecting starts a background `ssh -M` master bound to a private control
//! socket; every later command for the same connection identity is
//! multiplexed over that socket with `ssh -S`, so authentication happens
//! once per identity per run. Masters are torn down by
//! [`SessionManager::close_all`], which also runs on drop.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sha2::{Digest as _, Sha256};

use crate::config::normalize::SshSettings;
use crate::error::SessionError;
use crate::exec::Executor;
use crate::operations::FileSystemOps;
use crate::transport::{RemoteSessionTransport, Transport};

/// Seconds between keep-alive probes on an established session.
const SERVER_ALIVE_INTERVAL_SECS: u64 = 15;

/// Validated connection parameters of a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshEndpoint {
    /// Host name or address.
    pub host: String,
    /// Login user.
    pub username: String,
    /// Port.
    pub port: u16,
    /// Existing identity file.
    pub private_key: PathBuf,
    /// Connect timeout in seconds.
    pub timeout_secs: u64,
}

impl SshEndpoint {
    /// Validate resolved `ssh` settings.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingEndpointField`] naming the first of
    /// `host`, `username` or `privateKey` that is absent; a key path that
    /// is not an existing file counts as absent.
    pub fn from_settings(
        ssh: &SshSettings,
        fs_ops: &dyn FileSystemOps,
    ) -> Result<Self, SessionError> {
        let present = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        let host = present(&ssh.host).ok_or(SessionError::MissingEndpointField("host"))?;
        let username =
            present(&ssh.username).ok_or(SessionError::MissingEndpointField("username"))?;
        let private_key = present(&ssh.private_key)
            .map(PathBuf::from)
            .filter(|key| fs_ops.is_file(key))
            .ok_or(SessionError::MissingEndpointField("privateKey"))?;
        Ok(Self {
            host,
            username,
            port: ssh.port,
            private_key,
            timeout_secs: ssh.timeout_secs,
        })
    }

    /// `user@host`, as passed to `ssh`.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    /// `user@host:port`, for messages.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// The identity sessions are cached under.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        ConnectionId {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            private_key: self.private_key.clone(),
        }
    }
}

/// Key of the session cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    /// Host name or address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Identity file.
    pub private_key: PathBuf,
}

impl ConnectionId {
    /// Short stable digest of the identity, used to name control sockets.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.username.as_bytes());
        hasher.update(b"@");
        hasher.update(self.host.as_bytes());
        hasher.update(self.port.to_be_bytes());
        hasher.update(self.private_key.as_os_str().as_encoded_bytes());
        hasher
            .finalize()
            .iter()
            .take(8)
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// An established control master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    endpoint: SshEndpoint,
    socket: PathBuf,
}

impl Session {
    /// Control socket path.
    #[must_use]
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// `ssh` arguments running `command` over this session.
    #[must_use]
    pub fn command_args(&self, command: &str) -> Vec<String> {
        let max_missed = self
            .endpoint
            .timeout_secs
            .div_ceil(SERVER_ALIVE_INTERVAL_SECS)
            .max(1);
        vec![
            "-S".to_string(),
            self.socket.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ServerAliveInterval={SERVER_ALIVE_INTERVAL_SECS}"),
            "-o".to_string(),
            format!("ServerAliveCountMax={max_missed}"),
            "-p".to_string(),
            self.endpoint.port.to_string(),
            self.endpoint.destination(),
            "--".to_string(),
            command.to_string(),
        ]
    }

    /// `ssh` arguments asking the master to exit.
    #[must_use]
    pub fn exit_args(&self) -> Vec<String> {
        vec![
            "-S".to_string(),
            self.socket.display().to_string(),
            "-O".to_string(),
            "exit".to_string(),
            "-p".to_string(),
            self.endpoint.port.to_string(),
            self.endpoint.destination(),
        ]
    }
}

/// `ssh` arguments that start a background control master for `endpoint`
/// on `socket`.
#[must_use]
pub fn master_args(endpoint: &SshEndpoint, socket: &Path) -> Vec<String> {
    vec![
        "-M".to_string(),
        "-S".to_string(),
        socket.display().to_string(),
        "-f".to_string(),
        "-N".to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", endpoint.timeout_secs),
        "-o".to_string(),
        "IdentitiesOnly=yes".to_string(),
        "-i".to_string(),
        endpoint.private_key.display().to_string(),
        "-p".to_string(),
        endpoint.port.to_string(),
        endpoint.destination(),
    ]
}

/// Hands out a remote transport for a task's `ssh` settings.
pub trait Connector: Send + Sync + std::fmt::Debug {
    /// Return a transport bound to an authenticated session, establishing
    /// the session on first use.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the settings are incomplete or the
    /// connection cannot be authenticated.
    fn connect(&self, ssh: &SshSettings) -> Result<Arc<dyn Transport>, SessionError>;

    /// Close every session opened so far.
    fn close_all(&self);
}

/// Caches one control master per [`ConnectionId`] for the process lifetime.
#[derive(Debug)]
pub struct SessionManager {
    executor: Arc<dyn Executor>,
    fs_ops: Arc<dyn FileSystemOps>,
    socket_dir: tempfile::TempDir,
    sessions: Mutex<HashMap<ConnectionId, Arc<Session>>>,
}

impl SessionManager {
    /// Create a manager keeping control sockets in a fresh private
    /// temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket directory cannot be created.
    pub fn new(
        executor: Arc<dyn Executor>,
        fs_ops: Arc<dyn FileSystemOps>,
    ) -> std::io::Result<Self> {
        let socket_dir = tempfile::Builder::new()
            .prefix("rsync-runner-")
            .tempdir()?;
        Ok(Self {
            executor,
            fs_ops,
            socket_dir,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Return the session for `ssh`, starting a control master if none is
    /// open for its identity yet.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingEndpointField`] for incomplete
    /// settings, [`SessionError::AuthenticationFailed`] when `ssh` rejects
    /// the login, and [`SessionError::Exec`] when `ssh` cannot be run.
    pub fn session(&self, ssh: &SshSettings) -> Result<Arc<Session>, SessionError> {
        let endpoint = SshEndpoint::from_settings(ssh, self.fs_ops.as_ref())?;
        let id = endpoint.id();
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(session) = sessions.get(&id) {
            return Ok(Arc::clone(session));
        }

        let socket = self
            .socket_dir
            .path()
            .join(format!("{}.sock", id.digest()));
        let args = master_args(&endpoint, &socket);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self
            .executor
            .run_unchecked("ssh", &args)
            .map_err(|source| SessionError::Exec {
                destination: endpoint.display(),
                source,
            })?;
        if !result.success {
            return Err(SessionError::AuthenticationFailed {
                destination: endpoint.display(),
                message: result.stderr.trim().to_string(),
            });
        }

        let session = Arc::new(Session { endpoint, socket });
        sessions.insert(id, Arc::clone(&session));
        drop(sessions);
        Ok(session)
    }
}

impl Connector for SessionManager {
    fn connect(&self, ssh: &SshSettings) -> Result<Arc<dyn Transport>, SessionError> {
        let session = self.session(ssh)?;
        Ok(Arc::new(RemoteSessionTransport::new(
            session,
            Arc::clone(&self.executor),
        )))
    }

    fn close_all(&self) {
        let drained: Vec<Arc<Session>> = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();
        for session in drained {
            let args = session.exit_args();
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            // A master that already died leaves nothing to close.
            let _ = self.executor.run_unchecked("ssh", &args);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}
