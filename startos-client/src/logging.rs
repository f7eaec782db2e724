use anyhow::Result;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{format::FmtSpan, Layer as FmtLayer},
    layer::SubscriberExt as _,
    Layer as _, Registry,
};

pub(crate) struct Options {
    pub verbose: bool,
    pub color: bool,
}

/// Log to stderr, so that stdout only carries command output.
pub(crate) fn set_up(options: &Options) -> Result<()> {
    let filter = if options.verbose {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };

    let span_events = if options.verbose {
        // include enter/exit events for detailed tracing
        FmtSpan::FULL
    } else {
        // announce what we do and when we're done
        FmtSpan::NEW | FmtSpan::CLOSE
    };

    let fmt_layer = FmtLayer::new()
        .with_writer(std::io::stderr)
        .with_span_events(span_events)
        .with_ansi(options.color)
        .with_filter(filter);
    let subscriber = Registry::default().with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to set up tracing: {}", e))?;

    Ok(())
}
