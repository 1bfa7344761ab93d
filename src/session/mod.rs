//! FTP session: connection lifecycle and the buffered transfer loop

mod state;
mod transfer;
pub mod types;

pub use types::{DataPacket, TransferSession, BUFFER_SIZE, CONNECT_TIMEOUT, READ_TIMEOUT};
