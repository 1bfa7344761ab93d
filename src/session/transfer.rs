use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use super::types::{DataPacket, TransferSession, BUFFER_SIZE};
use crate::client::FtpClient;
use crate::codec;
use crate::error::FtpError;
use crate::events::{ActionType, ListenerRegistry, TransferEvent};

/// How the copy loop ended.
enum Flow {
    Exhausted,
    Cancelled,
}

/// Copy `reader` into `writer` chunk by chunk, consulting listeners.
fn pump<R: Read, W: Write>(
    listeners: &ListenerRegistry,
    data_safe: bool,
    event: &mut TransferEvent,
    reader: &mut R,
    writer: &mut W,
) -> io::Result<Flow> {
    let mut proceed = listeners.fire_before(event);
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut completed = 0u64;

    while proceed {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(Flow::Exhausted),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let chunk = &mut buffer[..read];
        if data_safe {
            codec::xor_in_place(chunk);
        }
        writer.write_all(chunk)?;

        completed += read as u64;
        event.set_completed_size(completed);
        proceed = listeners.fire_progress(event);
    }

    Ok(Flow::Cancelled)
}

/// Writer that collects bytes as lowercase hex text.
#[derive(Default)]
struct HexSink(String);

impl Write for HexSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.push_str(&hex::encode(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<C: FtpClient> TransferSession<C> {
    /// Run one transfer: open streams, copy, acknowledge, notify.
    ///
    /// `after` fires exactly once whatever happens past the connection check.
    fn run_transfer<R, W, F>(
        &mut self,
        action: ActionType,
        total_size: u64,
        remote_path: &str,
        open: F,
    ) -> Result<(), FtpError>
    where
        R: Read,
        W: Write,
        F: FnOnce(&mut C) -> Result<(R, W), FtpError>,
    {
        if self.client.is_none() {
            return Err(FtpError::NotConnected);
        }

        let mut event = TransferEvent::new(self.source(), action, total_size);
        tracing::debug!("{:?} {} started, expecting {} bytes", action, remote_path, total_size);

        let result = match self.client.as_mut() {
            Some(client) => Self::drive(
                client,
                &self.listeners,
                self.data_safe,
                &mut event,
                open,
            ),
            None => Err(FtpError::NotConnected),
        };

        match &result {
            Ok(()) => tracing::info!(
                "{:?} {} finished: {} bytes in {:?}",
                action,
                remote_path,
                event.completed_size,
                event.elapsed()
            ),
            Err(e) => {
                event.finish();
                tracing::warn!("{:?} {} failed: {}", action, remote_path, e);
            }
        }

        self.listeners.fire_after(&event);
        result
    }

    fn drive<R, W, F>(
        client: &mut C,
        listeners: &ListenerRegistry,
        data_safe: bool,
        event: &mut TransferEvent,
        open: F,
    ) -> Result<(), FtpError>
    where
        R: Read,
        W: Write,
        F: FnOnce(&mut C) -> Result<(R, W), FtpError>,
    {
        let (mut reader, mut writer) = open(client)?;

        match pump(listeners, data_safe, event, &mut reader, &mut writer)? {
            Flow::Exhausted => {
                writer.flush()?;
                drop(writer);
                drop(reader);

                // Without this reply every later transfer on the connection fails.
                client
                    .complete_pending_command()
                    .map_err(FtpError::ProtocolAck)?;
                event.finish_succeeded();
                Ok(())
            }
            Flow::Cancelled => {
                drop(writer);
                drop(reader);

                if let Err(e) = client.complete_pending_command() {
                    tracing::warn!("Reply after cancelled transfer not read: {}", e);
                }
                Err(FtpError::Cancelled {
                    completed: event.completed_size,
                })
            }
        }
    }

    /// Upload a local file. The event's total size is the file length.
    pub fn upload(
        &mut self,
        local_path: impl AsRef<Path>,
        remote_path: &str,
        append: bool,
    ) -> Result<(), FtpError> {
        if self.client.is_none() {
            return Err(FtpError::NotConnected);
        }

        let file = File::open(local_path.as_ref())?;
        let size = file.metadata()?.len();
        self.upload_from(file, size, remote_path, append)
    }

    /// Upload everything `reader` yields. The reader is not closed here when
    /// passed by reference.
    pub fn upload_from<R: Read>(
        &mut self,
        reader: R,
        size: u64,
        remote_path: &str,
        append: bool,
    ) -> Result<(), FtpError> {
        self.run_transfer(ActionType::Upload, size, remote_path, |client| {
            let remote = if append {
                client.append_stream(remote_path)
            } else {
                client.store_stream(remote_path)
            };
            let remote = remote.map_err(|e| FtpError::connection("open upload stream", e))?;
            Ok((reader, remote))
        })
    }

    pub fn upload_bytes(&mut self, data: &[u8], remote_path: &str, append: bool) -> Result<(), FtpError> {
        self.upload_from(data, data.len() as u64, remote_path, append)
    }

    /// Upload a packet, appending to whatever the server already holds.
    pub fn upload_packet(&mut self, packet: &DataPacket) -> Result<(), FtpError> {
        self.upload_bytes(&packet.data, &packet.name, true)
    }

    /// Download into `save_path`. The local file is only created once the
    /// server has opened the data stream.
    pub fn download(
        &mut self,
        remote_path: &str,
        save_path: impl AsRef<Path>,
        size_hint: u64,
    ) -> Result<(), FtpError> {
        let save_path = save_path.as_ref();
        self.run_transfer(ActionType::Download, size_hint, remote_path, |client| {
            let remote = client
                .retrieve_stream(remote_path)
                .map_err(|e| FtpError::connection("open download stream", e))?;
            let local = File::create(save_path)?;
            Ok((remote, local))
        })
    }

    /// Download into any writer.
    pub fn download_to<W: Write>(
        &mut self,
        remote_path: &str,
        writer: W,
        size_hint: u64,
    ) -> Result<(), FtpError> {
        self.run_transfer(ActionType::Download, size_hint, remote_path, |client| {
            let remote = client
                .retrieve_stream(remote_path)
                .map_err(|e| FtpError::connection("open download stream", e))?;
            Ok((remote, writer))
        })
    }

    /// Download into memory and return the content as lowercase hex.
    pub fn download_hex(&mut self, remote_path: &str, size_hint: u64) -> Result<String, FtpError> {
        let mut sink = HexSink::default();
        self.download_to(remote_path, &mut sink, size_hint)?;
        Ok(sink.0)
    }

    pub fn delete_file(&mut self, remote_path: &str) -> Result<(), FtpError> {
        let client = self.client.as_mut().ok_or(FtpError::NotConnected)?;

        if client.delete_file(remote_path)? {
            tracing::info!("Deleted {}", remote_path);
            Ok(())
        } else {
            Err(FtpError::DeleteRefused(remote_path.to_string()))
        }
    }
}
