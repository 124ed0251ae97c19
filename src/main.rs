//! clamcmd CLI - runs `ns_clamav` against a clamd daemon.

mod cli;

use anyhow::Context;
use clamcmd::core::CommandError;
use clamcmd::interp::parse_script;
use clamcmd::{ClamAvModule, Config, Interp, InterpPool, COMMAND_NAME};
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

fn init_tracing(format: cli::LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    match format {
        cli::LogFormat::Text => builder.init(),
        cli::LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("clamcmd: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: cli::Cli) -> anyhow::Result<ExitCode> {
    let config = match args.config {
        Some(ref path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let pool = InterpPool::new(args.server.as_str());
    let module = ClamAvModule::init_clamd(&pool, &args.module, &config)
        .await
        .with_context(|| format!("initializing module {}", args.module))?;
    let interp = pool.create_interp()?;
    debug!(commands = ?interp.command_names(), "Interpreter ready");

    let code = match args.command {
        cli::Command::Scanbuff { data } => {
            let argv = [COMMAND_NAME.to_string(), "scanbuff".to_string(), data];
            report(interp.invoke(&argv).await)
        }
        cli::Command::Scanfile { path } => {
            let argv = [
                COMMAND_NAME.to_string(),
                "scanfile".to_string(),
                path.display().to_string(),
            ];
            report(interp.invoke(&argv).await)
        }
        cli::Command::Eval { script } => report(interp.eval(&script).await),
        cli::Command::Repl => {
            let stdin = BufReader::new(tokio::io::stdin());
            repl(&interp, stdin, &mut std::io::stdout()).await?
        }
        cli::Command::Ping => {
            module.health_check().await.context("engine did not answer")?;
            println!("PONG");
            ExitCode::SUCCESS
        }
    };
    Ok(code)
}

fn report(result: Result<String, CommandError>) -> ExitCode {
    match result {
        Ok(text) => {
            if !text.is_empty() {
                println!("{text}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `true` while more lines could still complete the script.
fn is_incomplete(script: &str) -> bool {
    matches!(
        parse_script(script),
        Err(CommandError::Syntax(ref message)) if message.starts_with("missing")
    )
}

/// Evaluates scripts read from `input`, one per line, and writes each
/// result to `out`. Lines are joined while a brace or quote is still open.
async fn repl<R, W>(interp: &Interp, input: R, out: &mut W) -> anyhow::Result<ExitCode>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut script = String::new();
    let mut failed = false;

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        script.push_str(&line);
        script.push('\n');
        if is_incomplete(&script) {
            continue;
        }

        match interp.eval(&script).await {
            Ok(text) => {
                if !text.is_empty() {
                    writeln!(out, "{text}")?;
                }
            }
            Err(e) => {
                writeln!(out, "error: {e}")?;
                failed = true;
            }
        }
        script.clear();
    }

    // input ended inside a quoted or braced word
    if let Err(e) = parse_script(&script) {
        writeln!(out, "error: {e}")?;
        failed = true;
    }
    out.flush()?;

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clamcmd::core::ArcScanner;
    use clamcmd::{MockScanner, ModuleConfig};
    use std::sync::Arc;

    async fn interp() -> Interp {
        let pool = InterpPool::new("main");
        let scanner: ArcScanner =
            Arc::new(MockScanner::new().with_marker("EICAR", "Eicar-Test-Signature"));
        ClamAvModule::init(&pool, "nsclamav", ModuleConfig::default(), scanner)
            .await
            .unwrap();
        pool.create_interp().unwrap()
    }

    async fn run_repl(input: &str) -> (ExitCode, String) {
        let interp = interp().await;
        let mut out = Vec::new();
        let code = repl(&interp, input.as_bytes(), &mut out).await.unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_is_incomplete() {
        assert!(is_incomplete("a {x\n"));
        assert!(is_incomplete("a \"x\n"));
        assert!(!is_incomplete("a {x\ny}\n"));
        assert!(!is_incomplete("a \"x\"y\n"));
        assert!(!is_incomplete(""));
    }

    #[test]
    fn test_report_exit_status() {
        assert_eq!(report(Ok(String::new())), ExitCode::SUCCESS);
        assert_eq!(report(Ok("Eicar-Test-Signature".into())), ExitCode::SUCCESS);
        assert_eq!(
            report(Err(CommandError::Failed("Can't allocate memory".into()))),
            ExitCode::FAILURE
        );
    }

    #[tokio::test]
    async fn test_repl_results_and_errors() {
        let (code, out) = run_repl(
            "ns_clamav scanbuff {first line\nEICAR}\nns_clamav scanbuff\nns_clamav scanbuff clean\n",
        )
        .await;

        assert_eq!(
            out,
            "Eicar-Test-Signature\n\
             error: wrong # args: should be \"ns_clamav command ?args ...?\"\n"
        );
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn test_repl_clean_run_succeeds() {
        let (code, out) = run_repl("ns_clamav scanbuff a\n\nns_clamav scanbuff b\n").await;
        assert_eq!(out, "");
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_repl_unterminated_input() {
        let (code, out) = run_repl("ns_clamav scanbuff {open\n").await;
        assert_eq!(out, "error: missing close-brace\n");
        assert_eq!(code, ExitCode::FAILURE);
    }
}
