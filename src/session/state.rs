use std::sync::Arc;

use super::types::{ClientFactory, TransferSession, CONNECT_TIMEOUT, READ_TIMEOUT};
use crate::client::{FtpClient, NetFtpClient};
use crate::error::FtpError;
use crate::events::{ListenerRegistry, TransferListener};
use crate::profile::ConnectionProfile;

impl TransferSession<NetFtpClient> {
    /// Session that talks to a real FTP server.
    pub fn new(profile: ConnectionProfile) -> Self {
        Self::with_client_factory(Some(profile), NetFtpClient::default)
    }
}

impl<C: FtpClient> TransferSession<C> {
    pub fn with_client_factory<F>(profile: Option<ConnectionProfile>, factory: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        let factory: ClientFactory<C> = Box::new(factory);
        Self {
            profile,
            client: None,
            factory,
            data_safe: false,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Open a new connection, dropping any existing one first.
    pub fn connect(&mut self) -> Result<(), FtpError> {
        let profile = self.profile.clone().ok_or(FtpError::MissingProfile)?;

        if self.client.is_some() {
            self.close();
        }

        tracing::info!("Connecting to {}", profile.label());
        let mut client = (self.factory)();

        if let Err(e) = Self::open(&mut client, &profile) {
            tracing::error!("Connection to {} failed: {}", profile.label(), e);
            let _ = client.disconnect();
            return Err(e);
        }

        tracing::info!("Connected to {} in {}", profile.label(), profile.init_path());
        self.client = Some(client);
        Ok(())
    }

    fn open(client: &mut C, profile: &ConnectionProfile) -> Result<(), FtpError> {
        client.set_connect_timeout(CONNECT_TIMEOUT);
        client
            .connect(profile.host(), profile.port())
            .map_err(|e| FtpError::connection("connect", e))?;
        client
            .login(profile.user(), &profile.effective_password())
            .map_err(|e| FtpError::connection("login", e))?;
        if profile.is_passive_mode() {
            client
                .enter_passive_mode()
                .map_err(|e| FtpError::connection("passive mode", e))?;
        }
        client
            .set_binary_mode()
            .map_err(|e| FtpError::connection("binary mode", e))?;
        client
            .set_read_timeout(READ_TIMEOUT)
            .map_err(|e| FtpError::connection("read timeout", e))?;
        client
            .change_directory(profile.init_path())
            .map_err(|e| FtpError::connection("change directory", e))?;
        Ok(())
    }

    /// Log out and disconnect. Safe to call at any time.
    pub fn close(&mut self) {
        let Some(mut client) = self.client.take() else {
            return;
        };

        if let Err(e) = client.logout() {
            tracing::warn!("Logout from {} failed: {}", self.source(), e);
        }
        if let Err(e) = client.disconnect() {
            tracing::warn!("Disconnect from {} failed: {}", self.source(), e);
        }
        tracing::info!("Closed connection to {}", self.source());
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// A detached copy of the profile.
    pub fn profile(&self) -> Option<ConnectionProfile> {
        self.profile.clone()
    }

    /// Takes effect on the next `connect`.
    pub fn set_profile(&mut self, profile: Option<ConnectionProfile>) {
        self.profile = profile;
    }

    pub fn is_data_safe(&self) -> bool {
        self.data_safe
    }

    pub fn set_data_safe(&mut self, data_safe: bool) {
        self.data_safe = data_safe;
    }

    pub fn add_listener(&mut self, listener: Arc<dyn TransferListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_listener(&mut self, listener: &Arc<dyn TransferListener>) {
        self.listeners.remove(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Label used in events and logs.
    pub(super) fn source(&self) -> String {
        self.profile
            .as_ref()
            .map(ConnectionProfile::label)
            .unwrap_or_else(|| "<no profile>".to_string())
    }

    #[cfg(test)]
    pub(crate) fn client_ref(&self) -> Option<&C> {
        self.client.as_ref()
    }
}

impl<C: FtpClient> Drop for TransferSession<C> {
    fn drop(&mut self) {
        self.close();
        self.listeners.clear();
    }
}
