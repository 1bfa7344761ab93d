use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};

use crate::profile::{ConnectionProfile, DEFAULT_PORT};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FtpHost {
    pub alias: String,
    pub host: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub port: Option<u16>,
    pub init_path: Option<String>,
    /// Falls back to the `passive_mode` setting in ftpr.toml
    pub passive: Option<bool>,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub group: Option<String>,
}

impl FtpHost {
    pub fn new(alias: String, host: String, user: String) -> Self {
        Self {
            alias,
            host,
            user,
            password: String::new(),
            port: None,
            init_path: None,
            passive: None,
            description: None,
            group: None,
        }
    }

    pub fn to_profile(&self, default_passive: bool) -> ConnectionProfile {
        let mut profile = ConnectionProfile::new(
            &self.host,
            self.port.unwrap_or(DEFAULT_PORT),
            &self.user,
            &self.password,
        );
        profile.set_init_path(self.init_path.as_deref());
        profile.set_passive_mode(self.passive.unwrap_or(default_passive));
        profile
    }
}

/// Exact alias match first, then case-insensitive.
pub fn find_host<'a>(hosts: &'a [FtpHost], alias: &str) -> Option<&'a FtpHost> {
    hosts
        .iter()
        .find(|h| h.alias == alias)
        .or_else(|| hosts.iter().find(|h| h.alias.eq_ignore_ascii_case(alias)))
}

/// Hosts matching `query` on alias, host name or description, best first.
pub fn search_hosts<'a>(hosts: &'a [FtpHost], query: &str) -> Vec<&'a FtpHost> {
    if query.is_empty() {
        return hosts.iter().collect();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, &FtpHost)> = hosts
        .iter()
        .filter_map(|host| {
            [
                Some(host.alias.as_str()),
                Some(host.host.as_str()),
                host.description.as_deref(),
            ]
            .into_iter()
            .flatten()
            .filter_map(|field| matcher.fuzzy_match(field, query))
            .max()
            .map(|score| (score, host))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, host)| host).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<FtpHost> {
        let mut backup = FtpHost::new(
            "backup".to_string(),
            "backup.example.com".to_string(),
            "ops".to_string(),
        );
        backup.description = Some("nightly archives".to_string());
        let mut mirror = FtpHost::new(
            "Mirror".to_string(),
            "mirror.example.org".to_string(),
            "anonymous".to_string(),
        );
        mirror.port = Some(2121);
        mirror.init_path = Some("/pub".to_string());
        vec![backup, mirror]
    }

    #[test]
    fn test_to_profile() {
        let hosts = hosts();
        let profile = hosts[1].to_profile(true);
        assert_eq!(profile.host(), "mirror.example.org");
        assert_eq!(profile.port(), 2121);
        assert_eq!(profile.init_path(), "/pub");
        assert!(profile.is_passive_mode());

        let profile = hosts[0].to_profile(false);
        assert_eq!(profile.port(), DEFAULT_PORT);
        assert_eq!(profile.init_path(), "/");
        assert!(!profile.is_passive_mode());
    }

    #[test]
    fn test_find_host() {
        let hosts = hosts();
        assert_eq!(find_host(&hosts, "backup").unwrap().user, "ops");
        assert_eq!(find_host(&hosts, "mirror").unwrap().alias, "Mirror");
        assert!(find_host(&hosts, "nope").is_none());
    }

    #[test]
    fn test_search_hosts() {
        let hosts = hosts();
        assert_eq!(search_hosts(&hosts, "").len(), 2);

        let found = search_hosts(&hosts, "arch");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].alias, "backup");

        assert!(search_hosts(&hosts, "zzz").is_empty());
    }
}
