use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::FtpClient;

#[derive(Debug, Default)]
struct ServerState {
    files: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
    users: HashMap<String, String>,
    offline: bool,
    read_failure: Option<usize>,
    write_failure: Option<usize>,
    commands: Vec<String>,
}

/// An FTP server held entirely in memory.
///
/// Enforces the one rule the session depends on: after a data transfer the
/// reply has to be collected with `complete_pending_command`, otherwise the
/// next data command on that connection is rejected.
#[derive(Debug, Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    pub fn new() -> Self {
        let mut state = ServerState::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        // A panicking test thread must not hide the server from the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Only accept this user/password pair. Without any user every login succeeds.
    pub fn with_user(self, user: &str, password: &str) -> Self {
        self.lock()
            .users
            .insert(user.to_string(), password.to_string());
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.lock().dirs.insert(normalize("/", path));
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.put_file(path, data);
        self
    }

    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.lock().files.insert(normalize("/", path), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&normalize("/", path)).cloned()
    }

    /// Refuse new connections.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make retrieve streams fail once `bytes` bytes have been read.
    pub fn set_read_failure(&self, bytes: Option<usize>) {
        self.lock().read_failure = bytes;
    }

    /// Make store/append streams fail once `bytes` bytes have been written.
    pub fn set_write_failure(&self, bytes: Option<usize>) {
        self.lock().write_failure = bytes;
    }

    /// Commands received so far, oldest first.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(verb))
            .count()
    }

    /// A fresh, unconnected client for this server.
    pub fn client(&self) -> MemoryFtpClient {
        MemoryFtpClient {
            server: self.clone(),
            connected: false,
            logged_in: false,
            cwd: "/".to_string(),
            pending: false,
            connect_timeout: None,
            read_timeout: None,
            passive: false,
            binary: false,
        }
    }

    fn record(&self, command: String) {
        self.lock().commands.push(command);
    }
}

fn normalize(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else if cwd.ends_with('/') {
        format!("{}{}", cwd, path)
    } else {
        format!("{}/{}", cwd, path)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    format!("/{}", parts.join("/"))
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "530 Please login with USER and PASS")
}

/// Client side of a [`MemoryServer`] connection.
#[derive(Debug)]
pub struct MemoryFtpClient {
    server: MemoryServer,
    connected: bool,
    logged_in: bool,
    cwd: String,
    pending: bool,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    passive: bool,
    binary: bool,
}

impl MemoryFtpClient {
    pub fn is_passive(&self) -> bool {
        self.passive
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn timeouts(&self) -> (Option<Duration>, Option<Duration>) {
        (self.connect_timeout, self.read_timeout)
    }

    fn begin_transfer(&mut self, verb: &str, remote_path: &str) -> io::Result<String> {
        if !self.logged_in {
            return Err(not_connected());
        }
        self.server.record(format!("{} {}", verb, remote_path));
        if self.pending {
            return Err(io::Error::other(
                "425 previous transfer was never acknowledged",
            ));
        }
        Ok(normalize(&self.cwd, remote_path))
    }

    fn open_writer(&mut self, verb: &str, remote_path: &str, append: bool) -> io::Result<MemoryWriter> {
        let path = self.begin_transfer(verb, remote_path)?;
        let fail_after = {
            let mut state = self.server.lock();
            let file = state.files.entry(path.clone()).or_default();
            if !append {
                file.clear();
            }
            state.write_failure
        };
        self.pending = true;
        Ok(MemoryWriter {
            server: self.server.clone(),
            path,
            written: 0,
            fail_after,
        })
    }
}

impl FtpClient for MemoryFtpClient {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = Some(timeout);
    }

    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.server.record(format!("CONNECT {}:{}", host, port));
        if self.server.lock().offline {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("connection refused by {}:{}", host, port),
            ));
        }
        self.connected = true;
        Ok(())
    }

    fn login(&mut self, user: &str, password: &str) -> io::Result<()> {
        if !self.connected {
            return Err(not_connected());
        }
        self.server.record(format!("USER {}", user));
        let accepted = {
            let state = self.server.lock();
            state.users.is_empty() || state.users.get(user).map(String::as_str) == Some(password)
        };
        if !accepted {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "530 Login incorrect",
            ));
        }
        self.logged_in = true;
        Ok(())
    }

    fn enter_passive_mode(&mut self) -> io::Result<()> {
        if !self.connected {
            return Err(not_connected());
        }
        self.server.record("PASV".to_string());
        self.passive = true;
        Ok(())
    }

    fn set_binary_mode(&mut self) -> io::Result<()> {
        if !self.logged_in {
            return Err(not_connected());
        }
        self.server.record("TYPE I".to_string());
        self.binary = true;
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.read_timeout = Some(timeout);
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> io::Result<()> {
        if !self.logged_in {
            return Err(not_connected());
        }
        self.server.record(format!("CWD {}", path));
        let target = normalize(&self.cwd, path);
        if !self.server.lock().dirs.contains(&target) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("550 {}: No such directory", path),
            ));
        }
        self.cwd = target;
        Ok(())
    }

    fn logout(&mut self) -> io::Result<()> {
        if !self.connected {
            return Err(not_connected());
        }
        self.server.record("QUIT".to_string());
        self.logged_in = false;
        Ok(())
    }

    fn disconnect(&mut self) -> io::Result<()> {
        self.connected = false;
        self.logged_in = false;
        self.pending = false;
        Ok(())
    }

    fn retrieve_stream(&mut self, remote_path: &str) -> io::Result<Self::Reader> {
        let path = self.begin_transfer("RETR", remote_path)?;
        let (data, fail_after) = {
            let state = self.server.lock();
            let data = state.files.get(&path).cloned().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("550 {}: No such file", remote_path),
                )
            })?;
            (data, state.read_failure)
        };
        self.pending = true;
        Ok(MemoryReader {
            data: io::Cursor::new(data),
            fail_after,
        })
    }

    fn store_stream(&mut self, remote_path: &str) -> io::Result<Self::Writer> {
        self.open_writer("STOR", remote_path, false)
    }

    fn append_stream(&mut self, remote_path: &str) -> io::Result<Self::Writer> {
        self.open_writer("APPE", remote_path, true)
    }

    fn complete_pending_command(&mut self) -> io::Result<()> {
        if !self.logged_in {
            return Err(not_connected());
        }
        self.server.record("ACK".to_string());
        if !std::mem::replace(&mut self.pending, false) {
            return Err(io::Error::other("503 no transfer in progress"));
        }
        Ok(())
    }

    fn delete_file(&mut self, remote_path: &str) -> io::Result<bool> {
        if !self.logged_in {
            return Err(not_connected());
        }
        self.server.record(format!("DELE {}", remote_path));
        let path = normalize(&self.cwd, remote_path);
        Ok(self.server.lock().files.remove(&path).is_some())
    }
}

/// Data stream of a RETR.
#[derive(Debug)]
pub struct MemoryReader {
    data: io::Cursor<Vec<u8>>,
    fail_after: Option<usize>,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(limit) = self.fail_after {
            let pos = self.data.position() as usize;
            if pos >= limit {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "data connection reset",
                ));
            }
            let room = (limit - pos).min(buf.len());
            return self.data.read(&mut buf[..room]);
        }
        self.data.read(buf)
    }
}

/// Data stream of a STOR or APPE. Bytes land on the server as they are written.
#[derive(Debug)]
pub struct MemoryWriter {
    server: MemoryServer,
    path: String,
    written: usize,
    fail_after: Option<usize>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let take = match self.fail_after {
            Some(limit) if self.written >= limit => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "data connection closed",
                ));
            }
            Some(limit) => (limit - self.written).min(buf.len()),
            None => buf.len(),
        };
        self.server
            .lock()
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(&buf[..take]);
        self.written += take;
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
