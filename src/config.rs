//! TOML configuration for module instances.
//!
//! A configuration document holds one table per module instance, named
//! after the server and module it belongs to:
//!
//! ```toml
//! ["ns/server/main/module/nsclamav"]
//! dbdir = "/var/lib/clamav"
//! maxfilesize = 20971520
//! socket = "/run/clamav/clamd.ctl"
//! ```
//!
//! The same section may also be written as nested tables
//! (`[ns.server.main.module.nsclamav]`). Missing keys fall back to their
//! defaults and a missing section means "all defaults".

use crate::core::error::{ConfigError, ConfigResult};
use crate::core::{ScanLimits, ScanOptions, ScanSettings};
use crate::engine::clamd::{BufferMode, ClamdConfig, Endpoint, FileMode};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Returns the section path for a module instance,
/// e.g. `ns/server/main/module/nsclamav`.
pub fn section_path(server: &str, module: &str) -> String {
    format!("ns/server/{server}/module/{module}")
}

/// A parsed configuration document.
#[derive(Debug, Clone, Default)]
pub struct Config {
    root: toml::Table,
}

impl Config {
    /// Reads and parses a configuration file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Resolves the configuration of one module instance.
    pub fn section(&self, server: &str, module: &str) -> ConfigResult<ModuleConfig> {
        let path = section_path(server, module);
        let raw = match self.lookup(&path) {
            Some(table) => RawSection::deserialize(toml::Value::Table(table.clone()))?,
            None => {
                tracing::debug!(section = %path, "No configuration section, using defaults");
                RawSection::default()
            }
        };
        raw.resolve(path)
    }

    fn lookup(&self, path: &str) -> Option<&toml::Table> {
        if let Some(toml::Value::Table(table)) = self.root.get(path) {
            return Some(table);
        }
        let mut table = &self.root;
        for part in path.split('/') {
            match table.get(part) {
                Some(toml::Value::Table(next)) => table = next,
                _ => return None,
            }
        }
        Some(table)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            root: s.parse::<toml::Table>()?,
        })
    }
}

/// Fully resolved configuration for one module instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleConfig {
    /// Section path this configuration was read from.
    pub section: String,

    /// Signature database directory checked at load; `None` leaves it
    /// to the daemon's own `DatabaseDirectory`.
    pub dbdir: Option<PathBuf>,

    /// Archive and size limits.
    pub limits: ScanLimits,

    /// Content parsers enabled for `scanfile`.
    pub options: ScanOptions,

    /// Connection to the clamd engine.
    pub clamd: ClamdConfig,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            section: String::new(),
            dbdir: None,
            limits: ScanLimits::default(),
            options: ScanOptions::default(),
            clamd: ClamdConfig::default(),
        }
    }
}

impl ModuleConfig {
    /// Limits and options as sent with each scan.
    pub fn settings(&self) -> ScanSettings {
        ScanSettings::new(self.limits, self.options)
    }

    /// Sets the database directory.
    pub fn with_dbdir(mut self, dbdir: impl Into<PathBuf>) -> Self {
        self.dbdir = Some(dbdir.into());
        self
    }

    /// Sets the scan limits.
    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the scan options.
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSection {
    dbdir: Option<PathBuf>,
    maxfiles: Option<i64>,
    maxfilesize: Option<i64>,
    maxreclevel: Option<i64>,
    maxratio: Option<i64>,
    archivememlim: Option<i64>,
    socket: Option<PathBuf>,
    address: Option<String>,
    connect_timeout: Option<u64>,
    scan_timeout: Option<u64>,
    archive: Option<bool>,
    mail: Option<bool>,
    ole2: Option<bool>,
    buffer_mode: Option<BufferMode>,
    tempdir: Option<PathBuf>,
    file_mode: Option<FileMode>,
}

impl RawSection {
    fn resolve(self, section: String) -> ConfigResult<ModuleConfig> {
        let defaults = ScanLimits::default();
        let limit = |key: &str, value: Option<i64>, default: u64| -> ConfigResult<u64> {
            match value {
                None => Ok(default),
                Some(v) => u64::try_from(v).map_err(|_| ConfigError::InvalidValue {
                    section: section.clone(),
                    key: key.to_string(),
                    reason: format!("must not be negative, got {v}"),
                }),
            }
        };

        let limits = ScanLimits {
            maxfiles: limit("maxfiles", self.maxfiles, defaults.maxfiles)?,
            maxfilesize: limit("maxfilesize", self.maxfilesize, defaults.maxfilesize)?,
            maxreclevel: limit("maxreclevel", self.maxreclevel, defaults.maxreclevel)?,
            maxratio: limit("maxratio", self.maxratio, defaults.maxratio)?,
            archivememlim: limit("archivememlim", self.archivememlim, defaults.archivememlim)?,
        };

        let default_options = ScanOptions::default();
        let options = ScanOptions {
            archive: self.archive.unwrap_or(default_options.archive),
            mail: self.mail.unwrap_or(default_options.mail),
            ole2: self.ole2.unwrap_or(default_options.ole2),
        };

        let mut clamd = ClamdConfig::default();
        if let Some(socket) = self.socket {
            clamd = clamd.with_socket(socket);
        }
        if let Some(address) = self.address {
            if address.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    section,
                    key: "address".into(),
                    reason: "must not be empty".into(),
                });
            }
            clamd = clamd.with_tcp(address);
        }
        for (key, secs) in [
            ("connect_timeout", self.connect_timeout),
            ("scan_timeout", self.scan_timeout),
        ] {
            if secs == Some(0) {
                return Err(ConfigError::InvalidValue {
                    section,
                    key: key.into(),
                    reason: "must be at least one second".into(),
                });
            }
        }
        if let Some(secs) = self.connect_timeout {
            clamd = clamd.with_connection_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.scan_timeout {
            clamd = clamd.with_scan_timeout(Duration::from_secs(secs));
        }
        if let Some(mode) = self.buffer_mode {
            clamd = clamd.with_buffer_mode(mode);
        }
        if let Some(dir) = self.tempdir {
            clamd = clamd.with_tempdir(dir);
        }
        if let Some(mode) = self.file_mode {
            clamd = clamd.with_file_mode(mode);
        }
        if let Some(ref dbdir) = self.dbdir {
            clamd = clamd.with_dbdir(dbdir.clone());
        }

        tracing::debug!(
            section = %section,
            endpoint = %clamd.endpoint,
            maxfilesize = limits.maxfilesize,
            "Resolved module configuration"
        );

        Ok(ModuleConfig {
            section,
            dbdir: self.dbdir,
            limits,
            options,
            clamd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_section_path() {
        assert_eq!(section_path("main", "nsclamav"), "ns/server/main/module/nsclamav");
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config: Config = "".parse().unwrap();
        let module = config.section("main", "nsclamav").unwrap();

        assert_eq!(module.section, "ns/server/main/module/nsclamav");
        assert_eq!(module.dbdir, None);
        assert_eq!(module.limits, ScanLimits::default());
        assert_eq!(module.options, ScanOptions::default());
        assert_eq!(module.clamd, ClamdConfig::default());
    }

    #[test]
    fn test_quoted_section_overrides() {
        let config: Config = r#"
            ["ns/server/main/module/nsclamav"]
            dbdir = "/opt/clamav/db"
            maxfiles = 50
            maxfilesize = 2048
            maxratio = 0
            mail = false
            address = "127.0.0.1:3310"
            scan_timeout = 30
            buffer_mode = "tempfile"
            tempdir = "/var/spool/clamcmd"
            file_mode = "path"
        "#
        .parse()
        .unwrap();

        let module = config.section("main", "nsclamav").unwrap();
        assert_eq!(module.dbdir, Some(PathBuf::from("/opt/clamav/db")));
        assert_eq!(module.limits.maxfiles, 50);
        assert_eq!(module.limits.maxfilesize, 2048);
        assert_eq!(module.limits.maxratio, 0);
        assert_eq!(module.limits.maxreclevel, 5);
        assert!(!module.options.mail);
        assert!(module.options.archive);
        assert_eq!(module.clamd.endpoint, Endpoint::Tcp("127.0.0.1:3310".into()));
        assert_eq!(module.clamd.scan_timeout, Duration::from_secs(30));
        assert_eq!(module.clamd.buffer_mode, BufferMode::TempFile);
        assert_eq!(module.clamd.tempdir, Some(PathBuf::from("/var/spool/clamcmd")));
        assert_eq!(module.clamd.file_mode, FileMode::Path);
        assert_eq!(module.clamd.dbdir, Some(PathBuf::from("/opt/clamav/db")));
    }

    #[test]
    fn test_nested_section_is_found() {
        let config: Config = r#"
            [ns.server.web.module.av]
            maxreclevel = 9
            socket = "/tmp/clamd.sock"
        "#
        .parse()
        .unwrap();

        let module = config.section("web", "av").unwrap();
        assert_eq!(module.limits.maxreclevel, 9);
        assert_eq!(
            module.clamd.endpoint,
            Endpoint::Unix(PathBuf::from("/tmp/clamd.sock"))
        );

        let other = config.section("main", "av").unwrap();
        assert_eq!(other.limits.maxreclevel, 5);
    }

    #[test]
    fn test_negative_limit_rejected() {
        let config: Config = r#"
            ["ns/server/main/module/nsclamav"]
            maxfiles = -1
        "#
        .parse()
        .unwrap();

        let err = config.section("main", "nsclamav").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "maxfiles"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config: Config = r#"
            ["ns/server/main/module/nsclamav"]
            connect_timeout = 0
        "#
        .parse()
        .unwrap();
        assert!(config.section("main", "nsclamav").is_err());
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let config: Config = r#"
            ["ns/server/main/module/nsclamav"]
            maxfiles = "lots"
        "#
        .parse()
        .unwrap();
        assert!(matches!(
            config.section("main", "nsclamav"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[\"ns/server/main/module/nsclamav\"]\nmaxfiles = 7").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.section("main", "nsclamav").unwrap().limits.maxfiles, 7);

        let missing = Config::from_file(Path::new("/no/such/config.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
