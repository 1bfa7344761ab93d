use std::io;

use thiserror::Error;

/// Coarse classification of a [`FtpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Transfer,
    ProtocolAck,
    Cancelled,
}

/// Errors reported by a [`crate::TransferSession`].
///
/// Every session operation returns these as values; nothing escapes the
/// session boundary as a panic.
#[derive(Debug, Error)]
pub enum FtpError {
    /// The session has no connection profile.
    #[error("ftp profile is not set")]
    MissingProfile,

    /// A transfer was requested before `connect` succeeded.
    #[error("ftp client is not connected")]
    NotConnected,

    /// Connecting, logging in or opening a data stream failed.
    #[error("{step} failed: {source}")]
    Connection {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    /// I/O failure while moving bytes.
    #[error("transfer failed: {0}")]
    Transfer(#[from] io::Error),

    /// The server did not acknowledge the end of the transfer.
    #[error("server did not acknowledge the transfer: {0}")]
    ProtocolAck(#[source] io::Error),

    /// The server answered a delete request negatively.
    #[error("delete of {0} was refused")]
    DeleteRefused(String),

    /// A listener vetoed the transfer.
    #[error("transfer cancelled by listener after {completed} bytes")]
    Cancelled { completed: u64 },
}

impl FtpError {
    pub(crate) fn connection(step: &'static str, source: io::Error) -> Self {
        Self::Connection { step, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FtpError::MissingProfile | FtpError::NotConnected => ErrorKind::Config,
            FtpError::Connection { .. } => ErrorKind::Connection,
            FtpError::Transfer(_) | FtpError::DeleteRefused(_) => ErrorKind::Transfer,
            FtpError::ProtocolAck(_) => ErrorKind::ProtocolAck,
            FtpError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(FtpError::MissingProfile.kind(), ErrorKind::Config);
        assert_eq!(FtpError::NotConnected.kind(), ErrorKind::Config);
        assert_eq!(
            FtpError::connection("login", io::Error::other("530")).kind(),
            ErrorKind::Connection
        );
        assert_eq!(
            FtpError::ProtocolAck(io::Error::other("426")).kind(),
            ErrorKind::ProtocolAck
        );
        assert_eq!(FtpError::Cancelled { completed: 3 }.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_connection_message_names_step() {
        let err = FtpError::connection("login", io::Error::other("530 Login incorrect"));
        assert_eq!(err.to_string(), "login failed: 530 Login incorrect");
    }
}
