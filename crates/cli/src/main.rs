use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;

fn main() -> anyhow::Result<ExitCode> {
    let result = cartstore_cli::run();

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", result.output).context("failed to write command output")?;
    Ok(ExitCode::from(result.exit_code))
}
