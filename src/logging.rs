use clap::ValueEnum;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Default filter when `RUST_LOG` isn't set.
fn default_directives(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "info,maw=debug,maw_pipeline=debug,maw_inspect=debug,maw_graph=debug,maw_storage=debug",
        _ => "debug,maw=trace,maw_pipeline=trace,maw_inspect=trace,maw_graph=trace,maw_storage=trace",
    }
}

/// Install the global subscriber. Logs go to stderr; stdout belongs to the
/// published messages.
pub fn init(verbose: u8, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    fn test_default_directives_parse(#[case] verbose: u8) {
        assert!(EnvFilter::try_new(default_directives(verbose)).is_ok());
    }
}
