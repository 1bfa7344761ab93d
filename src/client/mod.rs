//! The FTP protocol capability consumed by [`crate::TransferSession`].
//!
//! The session never speaks the wire protocol itself; it drives an
//! [`FtpClient`] through connect, login and the data-stream commands.

#[cfg(any(test, feature = "testing"))]
mod memory;
mod net;

use std::io::{self, Read, Write};
use std::time::Duration;

#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryFtpClient, MemoryServer};
pub use net::NetFtpClient;

/// A connected (or connectable) FTP control channel.
pub trait FtpClient: Send {
    type Reader: Read;
    type Writer: Write;

    fn set_connect_timeout(&mut self, timeout: Duration);

    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    fn login(&mut self, user: &str, password: &str) -> io::Result<()>;

    fn enter_passive_mode(&mut self) -> io::Result<()>;

    fn set_binary_mode(&mut self) -> io::Result<()>;

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    fn change_directory(&mut self, path: &str) -> io::Result<()>;

    fn logout(&mut self) -> io::Result<()>;

    fn disconnect(&mut self) -> io::Result<()>;

    fn retrieve_stream(&mut self, remote_path: &str) -> io::Result<Self::Reader>;

    fn store_stream(&mut self, remote_path: &str) -> io::Result<Self::Writer>;

    fn append_stream(&mut self, remote_path: &str) -> io::Result<Self::Writer>;

    /// Read the server's reply to the finished data transfer.
    ///
    /// Must be called once the data stream of every retrieve/store/append
    /// has been dropped, or the next command on the connection fails.
    fn complete_pending_command(&mut self) -> io::Result<()>;

    /// `Ok(false)` when the server refused the delete.
    fn delete_file(&mut self, remote_path: &str) -> io::Result<bool>;
}
