use std::fmt;
use std::time::Duration;

use crate::client::{FtpClient, NetFtpClient};
use crate::events::ListenerRegistry;
use crate::profile::ConnectionProfile;

/// Timeout for establishing the control connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for reads on the control connection.
pub const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Bytes moved per loop iteration, and so the cancellation granularity.
pub const BUFFER_SIZE: usize = 4 * 1024;

/// Builds a fresh, unconnected client for every `connect`.
pub type ClientFactory<C> = Box<dyn Fn() -> C + Send + Sync>;

/// A named in-memory payload, uploaded in append mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub name: String,
    pub data: Vec<u8>,
}

impl DataPacket {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// One FTP login plus the listeners watching its transfers.
///
/// Holds at most one live connection. Not meant to be shared between
/// threads; open one session per parallel transfer.
pub struct TransferSession<C: FtpClient = NetFtpClient> {
    pub(super) profile: Option<ConnectionProfile>,
    pub(super) client: Option<C>,
    pub(super) factory: ClientFactory<C>,
    /// Scramble payload bytes with the XOR codec
    pub(super) data_safe: bool,
    pub(super) listeners: ListenerRegistry,
}

impl<C: FtpClient> fmt::Debug for TransferSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("profile", &self.profile)
            .field("connected", &self.client.is_some())
            .field("data_safe", &self.data_safe)
            .field("listeners", &self.listeners)
            .finish()
    }
}
