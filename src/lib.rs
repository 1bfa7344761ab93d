//! FTP transfer helper.
//!
//! A [`TransferSession`] wraps an [`FtpClient`] and moves files through a
//! fixed 4 KiB buffer, notifying [`TransferListener`]s before, during and
//! after each transfer. Any `before`/`on_progress` callback returning `false`
//! stops the transfer at the next chunk boundary.
//!
//! ```no_run
//! use ftpr::{ConnectionProfile, TransferSession};
//!
//! let profile = ConnectionProfile::new("ftp.example.com", 21, "alice", "secret");
//! let mut session = TransferSession::new(profile);
//! session.connect()?;
//! session.upload("report.pdf", "/incoming/report.pdf", false)?;
//! session.close();
//! # Ok::<(), ftpr::FtpError>(())
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod profile;
pub mod session;

pub use client::{FtpClient, NetFtpClient};
#[cfg(any(test, feature = "testing"))]
pub use client::{MemoryFtpClient, MemoryServer};
pub use error::{ErrorKind, FtpError};
pub use events::{ActionType, ListenerRegistry, TransferEvent, TransferListener};
pub use profile::{ConnectionProfile, CredentialCipher};
pub use session::{DataPacket, TransferSession};
