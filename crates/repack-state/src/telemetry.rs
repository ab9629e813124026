/*
[INPUT]:  Log level / filter directive string
[OUTPUT]: Installed global tracing subscriber
[POS]:    Observability - process-wide log setup for embedding applications
[UPDATE]: When changing log format or filter handling
*/

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `log_level` (any `EnvFilter` directive).
pub fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_directive() {
        assert!(init_tracing("repack_state=notalevel").is_err());
    }
}
