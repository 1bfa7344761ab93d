use std::fmt;
use std::sync::Arc;

/// Default FTP control port.
pub const DEFAULT_PORT: u16 = 21;

/// Encrypts stored passwords for a [`ConnectionProfile`].
///
/// Ciphertexts must have a fixed length: a value of exactly that length is
/// taken as already encrypted and stored unchanged.
pub trait CredentialCipher: Send + Sync {
    fn encrypt(&self, plain: &str, user: &str) -> String;

    fn decrypt(&self, cipher: &str, user: &str) -> String;

    /// Length of every ciphertext produced by `encrypt`.
    fn cipher_len(&self) -> usize;
}

/// Where and how to log in.
#[derive(Clone)]
pub struct ConnectionProfile {
    host: String,
    port: u16,
    user: String,
    password: String,
    init_path: Option<String>,
    passive_mode: bool,
    security: Option<Arc<dyn CredentialCipher>>,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self::new("", DEFAULT_PORT, "", "")
    }
}

impl ConnectionProfile {
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Self {
        let mut profile = Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: String::new(),
            init_path: None,
            passive_mode: false,
            security: None,
        };
        profile.set_password(password);
        profile
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_host(&mut self, host: &str) {
        self.host = host.to_string();
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn set_user(&mut self, user: &str) {
        self.user = user.to_string();
    }

    /// The cipher in effect; none while the user is empty.
    fn active_cipher(&self) -> Option<&Arc<dyn CredentialCipher>> {
        self.security.as_ref().filter(|_| !self.user.is_empty())
    }

    /// The stored password, encrypted when a cipher is attached.
    pub fn password_value(&self) -> &str {
        &self.password
    }

    /// The password to send on login.
    pub fn effective_password(&self) -> String {
        match self.active_cipher() {
            Some(_) if self.password.is_empty() => String::new(),
            Some(cipher) => cipher.decrypt(&self.password, &self.user),
            None => self.password.clone(),
        }
    }

    pub fn set_password(&mut self, password: &str) {
        self.password = match self.active_cipher() {
            Some(cipher) if password.trim().len() == cipher.cipher_len() => password.to_string(),
            Some(cipher) => cipher.encrypt(password, &self.user),
            None => password.to_string(),
        };
    }

    /// Current working directory after login. Defaults to `/`.
    pub fn init_path(&self) -> &str {
        self.init_path.as_deref().unwrap_or("/")
    }

    pub fn set_init_path(&mut self, path: Option<&str>) {
        self.init_path = path.map(str::to_string);
    }

    pub fn is_passive_mode(&self) -> bool {
        self.passive_mode
    }

    pub fn set_passive_mode(&mut self, passive: bool) {
        self.passive_mode = passive;
    }

    pub fn security(&self) -> Option<&Arc<dyn CredentialCipher>> {
        self.security.as_ref()
    }

    /// Attach a cipher and re-store the current password through it.
    pub fn set_security(&mut self, cipher: Option<Arc<dyn CredentialCipher>>) {
        self.security = cipher;
        let current = std::mem::take(&mut self.password);
        self.set_password(&current);
    }

    pub fn with_security(mut self, cipher: Arc<dyn CredentialCipher>) -> Self {
        self.set_security(Some(cipher));
        self
    }

    pub fn with_init_path(mut self, path: &str) -> Self {
        self.set_init_path(Some(path));
        self
    }

    pub fn with_passive_mode(mut self, passive: bool) -> Self {
        self.passive_mode = passive;
        self
    }

    /// `user@host:port`
    pub fn label(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("init_path", &self.init_path())
            .field("passive_mode", &self.passive_mode)
            .field("secured", &self.security.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reversible toy cipher producing 64 hex chars.
    struct HexPad;

    impl CredentialCipher for HexPad {
        fn encrypt(&self, plain: &str, user: &str) -> String {
            let key = user.as_bytes();
            let mut bytes: Vec<u8> = plain
                .bytes()
                .enumerate()
                .map(|(i, b)| b ^ key[i % key.len()])
                .collect();
            bytes.resize(32, 0);
            hex::encode(bytes)
        }

        fn decrypt(&self, cipher: &str, user: &str) -> String {
            let key = user.as_bytes();
            let bytes = hex::decode(cipher).unwrap_or_default();
            let plain: Vec<u8> = bytes
                .iter()
                .enumerate()
                .map(|(i, b)| b ^ key[i % key.len()])
                .take_while(|b| *b != 0)
                .collect();
            String::from_utf8_lossy(&plain).into_owned()
        }

        fn cipher_len(&self) -> usize {
            64
        }
    }

    fn secured() -> ConnectionProfile {
        ConnectionProfile::new("ftp.example.com", 21, "alice", "").with_security(Arc::new(HexPad))
    }

    #[test]
    fn test_defaults() {
        let profile = ConnectionProfile::default();
        assert_eq!(profile.port(), DEFAULT_PORT);
        assert_eq!(profile.init_path(), "/");
        assert!(!profile.is_passive_mode());
    }

    #[test]
    fn test_plain_password_passthrough() {
        let profile = ConnectionProfile::new("h", 21, "bob", "secret");
        assert_eq!(profile.password_value(), "secret");
        assert_eq!(profile.effective_password(), "secret");
    }

    #[test]
    fn test_credential_round_trip() {
        let mut profile = secured();
        for raw in ["secret", "p@ss w0rd", "x"] {
            profile.set_password(raw);
            assert_ne!(profile.password_value(), raw);
            assert_eq!(profile.password_value().len(), 64);
            assert_eq!(profile.effective_password(), raw);
        }
    }

    #[test]
    fn test_no_double_encryption() {
        let mut profile = secured();
        profile.set_password("secret");
        let stored = profile.password_value().to_string();

        profile.set_password(&stored);
        assert_eq!(profile.password_value(), stored);
        assert_eq!(profile.effective_password(), "secret");
    }

    #[test]
    fn test_attaching_cipher_encrypts_existing_password() {
        let profile = ConnectionProfile::new("h", 21, "alice", "secret")
            .with_security(Arc::new(HexPad));
        assert_eq!(profile.password_value().len(), 64);
        assert_eq!(profile.effective_password(), "secret");
    }

    #[test]
    fn test_empty_user_bypasses_cipher() {
        let mut profile = ConnectionProfile::new("h", 21, "", "").with_security(Arc::new(HexPad));
        profile.set_password("secret");
        assert_eq!(profile.password_value(), "secret");
        assert_eq!(profile.effective_password(), "secret");
    }

    #[test]
    fn test_empty_secured_password() {
        let profile = secured();
        assert_eq!(profile.effective_password(), "");
    }

    #[test]
    fn test_clone_shares_cipher() {
        let mut profile = secured().with_init_path("/pub").with_passive_mode(true);
        profile.set_password("secret");

        let copy = profile.clone();
        assert_eq!(copy.host(), profile.host());
        assert_eq!(copy.password_value(), profile.password_value());
        assert_eq!(copy.init_path(), "/pub");
        assert!(copy.is_passive_mode());
        assert!(Arc::ptr_eq(
            copy.security().unwrap(),
            profile.security().unwrap()
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let profile = ConnectionProfile::new("h", 21, "bob", "secret");
        assert!(!format!("{:?}", profile).contains("secret"));
    }
}
