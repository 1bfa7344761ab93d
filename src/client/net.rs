use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::{FtpError as WireError, FtpStream, Mode};

use super::FtpClient;

/// [`FtpClient`] over a real control connection, backed by `suppaftp`.
pub struct NetFtpClient {
    stream: Option<FtpStream>,
    connect_timeout: Duration,
    /// Applied to the control socket and to every data socket
    read_timeout: Option<Duration>,
}

impl Default for NetFtpClient {
    fn default() -> Self {
        Self {
            stream: None,
            connect_timeout: Duration::from_secs(30),
            read_timeout: None,
        }
    }
}

fn to_io(err: WireError) -> io::Error {
    match err {
        WireError::ConnectionError(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

impl NetFtpClient {
    fn stream(&mut self) -> io::Result<&mut FtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "control connection is closed"))
    }

    fn apply_data_timeout(&self, socket: &TcpStream) -> io::Result<()> {
        socket.set_read_timeout(self.read_timeout)?;
        socket.set_write_timeout(self.read_timeout)
    }
}

impl FtpClient for NetFtpClient {
    type Reader = Box<dyn Read + Send>;
    type Writer = Box<dyn Write + Send>;

    fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        let mut last_err = io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address found for {}:{}", host, port),
        );

        for addr in (host, port).to_socket_addrs()? {
            match FtpStream::connect_timeout(addr, self.connect_timeout) {
                Ok(mut stream) => {
                    // Active until the caller asks for passive mode
                    stream.set_mode(Mode::Active);
                    tracing::debug!("Control connection established to {}", addr);
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => last_err = to_io(e),
            }
        }

        Err(last_err)
    }

    fn login(&mut self, user: &str, password: &str) -> io::Result<()> {
        self.stream()?.login(user, password).map_err(to_io)
    }

    fn enter_passive_mode(&mut self) -> io::Result<()> {
        self.stream()?.set_mode(Mode::Passive);
        Ok(())
    }

    fn set_binary_mode(&mut self) -> io::Result<()> {
        self.stream()?.transfer_type(FileType::Binary).map_err(to_io)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream()?.get_ref().set_read_timeout(Some(timeout))?;
        self.read_timeout = Some(timeout);
        Ok(())
    }

    fn change_directory(&mut self, path: &str) -> io::Result<()> {
        self.stream()?.cwd(path).map_err(to_io)
    }

    fn logout(&mut self) -> io::Result<()> {
        self.stream()?.quit().map_err(to_io)
    }

    fn disconnect(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        match stream.get_ref().shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }

    fn retrieve_stream(&mut self, remote_path: &str) -> io::Result<Self::Reader> {
        let data = self.stream()?.retr_as_stream(remote_path).map_err(to_io)?;
        self.apply_data_timeout(data.get_ref())?;
        Ok(Box::new(data))
    }

    fn store_stream(&mut self, remote_path: &str) -> io::Result<Self::Writer> {
        let data = self.stream()?.put_with_stream(remote_path).map_err(to_io)?;
        self.apply_data_timeout(data.get_ref())?;
        Ok(Box::new(data))
    }

    fn append_stream(&mut self, remote_path: &str) -> io::Result<Self::Writer> {
        let data = self.stream()?.append_with_stream(remote_path).map_err(to_io)?;
        self.apply_data_timeout(data.get_ref())?;
        Ok(Box::new(data))
    }

    fn complete_pending_command(&mut self) -> io::Result<()> {
        // The data stream was already dropped by the session; this only
        // reads the 226/250 reply off the control channel.
        self.stream()?
            .finalize_retr_stream(io::empty())
            .map_err(to_io)
    }

    fn delete_file(&mut self, remote_path: &str) -> io::Result<bool> {
        match self.stream()?.rm(remote_path) {
            Ok(()) => Ok(true),
            Err(WireError::UnexpectedResponse(_)) => {
                tracing::debug!("DELE {} refused by server", remote_path);
                Ok(false)
            }
            Err(e) => Err(to_io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::{SocketAddr, TcpListener};
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    /// Minimal control-channel server on loopback. Accepts one client,
    /// answers login and setup commands, and records every command line.
    /// Data connections opened through PASV are accepted and held silent.
    fn spawn_server() -> (SocketAddr, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (control, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(control.try_clone().unwrap());
            let mut writer = control;
            let mut commands = Vec::new();
            let mut data_listener: Option<TcpListener> = None;
            let mut held = Vec::new();

            writer.write_all(b"220 ready\r\n").unwrap();
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let command = line.trim_end().to_string();
                let verb = command
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_uppercase();
                commands.push(command);

                let reply = match verb.as_str() {
                    "USER" => "331 password required".to_string(),
                    "PASS" => "230 logged in".to_string(),
                    "TYPE" => "200 type set".to_string(),
                    "CWD" => "250 directory changed".to_string(),
                    "PASV" => {
                        let data = TcpListener::bind("127.0.0.1:0").unwrap();
                        let port = data.local_addr().unwrap().port();
                        data_listener = Some(data);
                        format!(
                            "227 Entering Passive Mode (127,0,0,1,{},{})",
                            port / 256,
                            port % 256
                        )
                    }
                    "RETR" => "150 opening data connection".to_string(),
                    "QUIT" => "221 bye".to_string(),
                    _ => "502 command not implemented".to_string(),
                };
                if writer.write_all(format!("{}\r\n", reply).as_bytes()).is_err() {
                    break;
                }

                if verb == "RETR" {
                    if let Some(data) = data_listener.take() {
                        if let Ok((conn, _)) = data.accept() {
                            held.push(conn);
                        }
                    }
                }
            }
            commands
        });

        (addr, handle)
    }

    fn logged_in(addr: SocketAddr) -> NetFtpClient {
        let mut client = NetFtpClient::default();
        client.connect("127.0.0.1", addr.port()).unwrap();
        client.login("tester", "secret").unwrap();
        client.set_binary_mode().unwrap();
        client
    }

    fn data_verb(commands: &[String]) -> Option<String> {
        commands
            .iter()
            .filter_map(|c| c.split_whitespace().next())
            .map(str::to_uppercase)
            .find(|v| matches!(v.as_str(), "PASV" | "EPSV" | "PORT" | "EPRT"))
    }

    #[test]
    fn test_commands_fail_when_not_connected() {
        let mut client = NetFtpClient::default();
        let err = client.login("anonymous", "").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(client.retrieve_stream("/x").is_err());
    }

    #[test]
    fn test_disconnect_without_connection_is_ok() {
        let mut client = NetFtpClient::default();
        assert!(client.disconnect().is_ok());
    }

    #[test]
    fn test_active_mode_unless_passive_requested() {
        let (addr, server) = spawn_server();
        let mut client = logged_in(addr);

        assert!(client.store_stream("x").is_err());
        client.disconnect().unwrap();

        let commands = server.join().unwrap();
        let verb = data_verb(&commands);
        assert!(
            matches!(verb.as_deref(), Some("PORT") | Some("EPRT")),
            "expected active mode, got {:?}",
            verb
        );
    }

    #[test]
    fn test_passive_mode_sends_pasv() {
        let (addr, server) = spawn_server();
        let mut client = logged_in(addr);
        client.enter_passive_mode().unwrap();

        assert!(client.store_stream("x").is_err());
        client.disconnect().unwrap();

        let commands = server.join().unwrap();
        assert_eq!(data_verb(&commands).as_deref(), Some("PASV"));
    }

    #[test]
    fn test_stalled_data_connection_times_out() {
        let (addr, server) = spawn_server();
        let mut client = logged_in(addr);
        client.enter_passive_mode().unwrap();
        client.set_read_timeout(Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let mut reader = client.retrieve_stream("stalled.bin").unwrap();
        let mut buffer = [0u8; 16];
        assert!(reader.read(&mut buffer).is_err());
        assert!(started.elapsed() < Duration::from_secs(10));

        drop(reader);
        client.disconnect().unwrap();
        server.join().unwrap();
    }
}
