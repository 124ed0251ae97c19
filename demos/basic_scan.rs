//! Basic scan example using the in-process mock engine.
//!
//! This example shows how to:
//! - Load the module into an interpreter pool
//! - Call `ns_clamav` from a script
//! - Tell clean, infected and failed scans apart
//!
//! Run with: cargo run --example basic_scan

use clamcmd::prelude::*;
use std::io::Write;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== clamcmd Basic Scan Example ===\n");

    // Anything containing the EICAR marker is reported as infected
    let scanner: ArcScanner = Arc::new(
        MockScanner::new()
            .with_name("example-engine")
            .with_marker("EICAR-STANDARD-ANTIVIRUS-TEST-FILE", "Eicar-Test-Signature"),
    );

    let config: Config = r#"
        ["ns/server/main/module/nsclamav"]
        maxfilesize = 1048576
    "#
    .parse()?;
    let module_config = config.section("main", "nsclamav")?;

    let pool = InterpPool::new("main");
    let module = ClamAvModule::init(&pool, "nsclamav", module_config, scanner).await?;
    println!("Database: {}", module.database().summary());

    let interp = pool.create_interp()?;

    let mut upload = tempfile::NamedTempFile::new()?;
    upload.write_all(b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*")?;

    let scripts = [
        "ns_clamav scanbuff {hello world}".to_string(),
        format!("ns_clamav scanfile {{{}}}", upload.path().display()),
        "ns_clamav scanfile /no/such/file".to_string(),
        "ns_clamav scanbuff".to_string(),
    ];

    for script in &scripts {
        println!("\n% {script}");
        match interp.eval(script).await {
            Ok(virus) if virus.is_empty() => println!("clean"),
            Ok(virus) => println!("infected: {virus}"),
            Err(e) => println!("error: {e}"),
        }
    }

    Ok(())
}
