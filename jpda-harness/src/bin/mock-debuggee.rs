// Mock debuggee binary
//
// Launched by the integration tests with the addresses of the debugger's
// JDWP and sync listeners. The mock module documents the scenario it
// walks; the exit code is the scenario's outcome.

use anyhow::{bail, Context, Result};
use jpda_harness::mock::{self, MockConfig};
use tracing_subscriber::EnvFilter;

fn parse_args() -> Result<MockConfig> {
    let mut jdwp_addr = None;
    let mut sync_addr = None;
    let mut workers = 2u32;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--jdwp" => jdwp_addr = args.next(),
            "--sync" => sync_addr = args.next(),
            "--workers" => {
                let value = args.next().context("--workers needs a value")?;
                workers = value.parse().context("--workers must be a number")?;
            }
            other => bail!(
                "unknown argument {other}; usage: \
                 mock-debuggee --jdwp HOST:PORT --sync HOST:PORT [--workers N]"
            ),
        }
    }

    Ok(MockConfig {
        jdwp_addr: jdwp_addr.context("--jdwp HOST:PORT is required")?,
        sync_addr: sync_addr.context("--sync HOST:PORT is required")?,
        workers,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jpda_harness=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = parse_args()?;
    let code = mock::run(config).await?;
    std::process::exit(code)
}
