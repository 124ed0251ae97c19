//! The `ns_clamav` interpreter command.
//!
//! ```text
//! ns_clamav scanbuff <string>
//! ns_clamav scanfile <path>
//! ```
//!
//! The result is the virus name when something was found and the empty
//! string when the content is clean. Engine errors become the command's
//! error result.

use crate::core::CommandError;
use crate::interp::{lookup_exact, Command};
use crate::module::ClamAvModule;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Name the command is registered under.
pub const COMMAND_NAME: &str = "ns_clamav";

const USAGE: &str = "ns_clamav command ?args ...?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subcommand {
    ScanBuff,
    ScanFile,
}

const SUBCOMMANDS: &[(&str, Subcommand)] = &[
    ("scanbuff", Subcommand::ScanBuff),
    ("scanfile", Subcommand::ScanFile),
];

/// `ns_clamav` bound to one loaded module instance.
#[derive(Debug, Clone)]
pub struct ClamAvCommand {
    module: Arc<ClamAvModule>,
}

impl ClamAvCommand {
    /// Creates the command for `module`.
    pub fn new(module: Arc<ClamAvModule>) -> Self {
        Self { module }
    }
}

#[async_trait]
impl Command for ClamAvCommand {
    fn name(&self) -> &str {
        COMMAND_NAME
    }

    async fn invoke(&self, args: &[String]) -> Result<String, CommandError> {
        let [_, subcommand, target, ..] = args else {
            return Err(CommandError::WrongArgs {
                usage: USAGE.to_string(),
            });
        };

        let result = match lookup_exact(SUBCOMMANDS, subcommand, "command")? {
            Subcommand::ScanBuff => self.module.scan_buffer(target.as_bytes()).await,
            Subcommand::ScanFile => self.module.scan_file(Path::new(target)).await,
        };

        match result {
            Ok(scan) => {
                tracing::debug!(
                    command = COMMAND_NAME,
                    subcommand = %subcommand,
                    outcome = %scan.outcome,
                    "Scan finished"
                );
                Ok(scan.command_text())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::core::ArcScanner;
    use crate::engine::MockScanner;
    use crate::interp::{Interp, InterpPool};
    use std::io::Write;

    async fn interp_with(scanner: MockScanner) -> Interp {
        let pool = InterpPool::new("main");
        let scanner: ArcScanner = Arc::new(scanner);
        ClamAvModule::init(&pool, "nsclamav", ModuleConfig::default(), scanner)
            .await
            .unwrap();
        pool.create_interp().unwrap()
    }

    #[tokio::test]
    async fn test_scanbuff_results() {
        let interp =
            interp_with(MockScanner::new().with_marker("EICAR", "Eicar-Test-Signature")).await;

        assert_eq!(
            interp.eval("ns_clamav scanbuff {X5O EICAR}").await.unwrap(),
            "Eicar-Test-Signature"
        );
        assert_eq!(interp.eval("ns_clamav scanbuff hello").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_scanfile_results() {
        let interp =
            interp_with(MockScanner::new().with_marker("EICAR", "Eicar-Test-Signature")).await;

        let mut infected = tempfile::NamedTempFile::new().unwrap();
        infected.write_all(b"...EICAR...").unwrap();
        let mut clean = tempfile::NamedTempFile::new().unwrap();
        clean.write_all(b"just text").unwrap();

        let argv = |path: &Path| {
            vec![
                COMMAND_NAME.to_string(),
                "scanfile".to_string(),
                path.display().to_string(),
            ]
        };
        assert_eq!(
            interp.invoke(&argv(infected.path())).await.unwrap(),
            "Eicar-Test-Signature"
        );
        assert_eq!(interp.invoke(&argv(clean.path())).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let interp = interp_with(MockScanner::new()).await;
        let err = interp
            .eval("ns_clamav scanfile /no/such/file")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "file not found: /no/such/file");
    }

    #[tokio::test]
    async fn test_wrong_number_of_args() {
        let interp = interp_with(MockScanner::new()).await;
        for script in ["ns_clamav", "ns_clamav scanbuff"] {
            let err = interp.eval(script).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                "wrong # args: should be \"ns_clamav command ?args ...?\""
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_subcommand() {
        let interp = interp_with(MockScanner::new()).await;
        let err = interp.eval("ns_clamav scan data").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad command \"scan\": must be scanbuff or scanfile"
        );

        // exact match only, no prefixes
        let err = interp.eval("ns_clamav scanb data").await.unwrap_err();
        assert!(matches!(err, CommandError::BadOption { .. }));
    }

    #[tokio::test]
    async fn test_extra_words_are_ignored() {
        let interp =
            interp_with(MockScanner::new().with_marker("EICAR", "Eicar-Test-Signature")).await;
        assert_eq!(
            interp
                .eval("ns_clamav scanbuff EICAR ignored words")
                .await
                .unwrap(),
            "Eicar-Test-Signature"
        );
    }

    #[tokio::test]
    async fn test_engine_error_text() {
        let interp = interp_with(MockScanner::new().with_error("Can't allocate memory")).await;
        let err = interp.eval("ns_clamav scanbuff data").await.unwrap_err();
        assert_eq!(err, CommandError::Failed("Can't allocate memory".into()));
    }
}
