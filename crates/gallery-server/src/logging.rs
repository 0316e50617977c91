use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
/// `verbose` is set.
pub fn init(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer().with_target(true).with_level(true).compact();

    let default_level = if verbose { "debug" } else { "info" };
    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let _ = init(false);
        assert!(init(true).is_err());
        tracing::info!("logging initialized");
    }
}
