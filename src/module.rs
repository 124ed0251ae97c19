//! Module startup and the scan entry points behind `ns_clamav`.
//!
//! [`ClamAvModule::init`] is the routine a server runs once per module
//! instance: it loads the signature database through the engine, logs
//! how much was loaded, and arranges for every interpreter of the server
//! to get the `ns_clamav` command.

use crate::audit::{self, EngineLoadedEvent};
use crate::command::ClamAvCommand;
use crate::config::{Config, ModuleConfig};
use crate::core::{
    ArcScanner, DatabaseInfo, ModuleError, ScanError, ScanOptions, ScanResult, ScanSettings,
};
use crate::engine::ClamdScanner;
use crate::interp::InterpPool;

use std::path::Path;
use std::sync::Arc;

/// A loaded module instance shared by all interpreters of a server.
#[derive(Debug)]
pub struct ClamAvModule {
    server: String,
    module: String,
    config: ModuleConfig,
    scanner: ArcScanner,
    database: DatabaseInfo,
}

impl ClamAvModule {
    /// Initializes the module instance `module` on `pool`.
    ///
    /// Loads the signature database and registers the `ns_clamav` command
    /// for every interpreter the pool creates. Calling this again for the
    /// same module name returns the instance that is already loaded.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::Scan` when the engine cannot load its
    /// database. Nothing is registered in that case.
    pub async fn init(
        pool: &InterpPool,
        module: &str,
        config: ModuleConfig,
        scanner: ArcScanner,
    ) -> Result<Arc<Self>, ModuleError> {
        pool.load_module::<Self, ModuleError, _, _>(module, || async move {
            let server = pool.server().to_string();

            let database = match scanner.load(&config.limits).await {
                Ok(database) => database,
                Err(e) => {
                    let reason = match &e {
                        ScanError::DatabaseLoad { reason } => reason.clone(),
                        other => other.to_string(),
                    };
                    tracing::error!(
                        server = %server,
                        module = %module,
                        engine = %scanner.name(),
                        "failed to load db: {}",
                        reason
                    );
                    return Err(e.into());
                }
            };

            tracing::info!(
                server = %server,
                module = %module,
                engine = %scanner.name(),
                "{}",
                database.summary()
            );
            audit::emit_engine_loaded(&EngineLoadedEvent::new(
                config.section.clone(),
                scanner.name(),
                &database,
            ));

            let instance = Arc::new(Self {
                server,
                module: module.to_string(),
                config,
                scanner,
                database,
            });

            let shared = Arc::clone(&instance);
            pool.register_init(module, move |interp| {
                interp.register(Arc::new(ClamAvCommand::new(Arc::clone(&shared))));
                Ok(())
            });

            Ok(instance)
        })
        .await
    }

    /// Resolves the configuration section for `module` and initializes it
    /// against the clamd daemon it names.
    pub async fn init_clamd(
        pool: &InterpPool,
        module: &str,
        config: &Config,
    ) -> Result<Arc<Self>, ModuleError> {
        let module_config = config.section(pool.server(), module)?;
        let scanner: ArcScanner = Arc::new(ClamdScanner::new(module_config.clamd.clone()));
        Self::init(pool, module, module_config, scanner).await
    }

    /// Server this instance belongs to.
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Module name this instance was loaded under.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The resolved configuration.
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// What the engine reported when the database was loaded.
    pub fn database(&self) -> &DatabaseInfo {
        &self.database
    }

    /// The engine handle.
    pub fn scanner(&self) -> &ArcScanner {
        &self.scanner
    }

    /// Scans an in-memory buffer.
    ///
    /// Buffers are scanned raw: limits apply, content parsers do not.
    pub async fn scan_buffer(&self, data: &[u8]) -> Result<ScanResult, ScanError> {
        let settings = ScanSettings::new(self.config.limits, ScanOptions::raw());
        let result = self.scanner.scan_buffer(data, &settings).await;
        self.record("buffer", result)
    }

    /// Scans a file by path with the configured scan options.
    pub async fn scan_file(&self, path: &Path) -> Result<ScanResult, ScanError> {
        let result = self.scanner.scan_file(path, &self.config.settings()).await;
        self.record("file", result)
    }

    /// Checks that the engine is still answering.
    pub async fn health_check(&self) -> Result<(), ScanError> {
        self.scanner.health_check().await
    }

    fn record(
        &self,
        kind: &str,
        result: Result<ScanResult, ScanError>,
    ) -> Result<ScanResult, ScanError> {
        match &result {
            Ok(scan) => {
                audit::emit_scan_completed(kind, scan);
            }
            Err(e) => {
                audit::emit_scan_failed(kind, self.scanner.name(), e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockScanner;

    fn mock(scanner: MockScanner) -> (Arc<MockScanner>, ArcScanner) {
        let scanner = Arc::new(scanner);
        let shared: ArcScanner = scanner.clone();
        (scanner, shared)
    }

    #[tokio::test]
    async fn test_init_registers_command_in_every_interp() {
        let pool = InterpPool::new("main");
        let (_, scanner) = mock(MockScanner::new());

        let module = ClamAvModule::init(&pool, "nsclamav", ModuleConfig::default(), scanner)
            .await
            .unwrap();
        assert_eq!(module.server(), "main");
        assert_eq!(module.module(), "nsclamav");
        assert_eq!(module.database().signature_count, Some(42));

        for _ in 0..2 {
            let interp = pool.create_interp().unwrap();
            assert!(interp.has_command("ns_clamav"));
        }
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let pool = InterpPool::new("main");
        let (counter, scanner) = mock(MockScanner::new());

        let first = ClamAvModule::init(&pool, "nsclamav", ModuleConfig::default(), scanner.clone())
            .await
            .unwrap();
        let second = ClamAvModule::init(&pool, "nsclamav", ModuleConfig::default(), scanner)
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load_count(), 1);
        assert!(pool.create_interp().unwrap().has_command("ns_clamav"));
    }

    #[tokio::test]
    async fn test_init_failure_registers_nothing() {
        let pool = InterpPool::new("main");
        let (_, scanner) = mock(MockScanner::new().with_load_error("cannot open main.cvd"));

        let err = ClamAvModule::init(&pool, "nsclamav", ModuleConfig::default(), scanner)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to load db: cannot open main.cvd");
        assert!(!pool.create_interp().unwrap().has_command("ns_clamav"));
        assert!(!pool.is_loaded("nsclamav").await);
    }

    #[tokio::test]
    async fn test_scans_use_configured_limits() {
        let pool = InterpPool::new("main");
        let (_, scanner) = mock(MockScanner::new().with_marker("EICAR", "Eicar-Test-Signature"));
        let limits = crate::core::ScanLimits {
            maxfilesize: 8,
            ..Default::default()
        };
        let config = ModuleConfig::default().with_limits(limits);

        let module = ClamAvModule::init(&pool, "nsclamav", config, scanner)
            .await
            .unwrap();

        let hit = module.scan_buffer(b"EICAR").await.unwrap();
        assert_eq!(hit.virus(), Some("Eicar-Test-Signature"));

        let err = module.scan_buffer(b"far too large").await.unwrap_err();
        assert!(matches!(err, ScanError::FileTooLarge { size: 13, max: 8 }));
        assert!(module.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_init_clamd_rejects_bad_config() {
        let pool = InterpPool::new("main");
        let config: Config = r#"
            ["ns/server/main/module/nsclamav"]
            maxfiles = -1
        "#
        .parse()
        .unwrap();

        let err = ClamAvModule::init_clamd(&pool, "nsclamav", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleError::Config(_)));
    }
}
