use std::collections::BTreeSet;

use almanac_core::config::load_config;
use almanac_db::store::MemoryStore;
use almanac_service::expand::Window;
use almanac_service::rights::{RightSet, StaticRights};
use almanac_service::service::{CalendarService, EventListRequest};
use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveTime};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "almanac")]
#[command(about = "List the events of the configured fixture store within a date window")]
struct Cli {
    /// First day of the window (YYYY-MM-DD)
    #[arg(value_parser = parse_day)]
    from: NaiveDate,

    /// Last day of the window, inclusive (YYYY-MM-DD)
    #[arg(value_parser = parse_day)]
    to: NaiveDate,

    /// Principal listing the events
    #[arg(default_value = "owner")]
    viewer: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    if cli.to < cli.from {
        bail!("window ends before it starts");
    }
    let window = Window::new(
        cli.from.and_time(NaiveTime::MIN),
        cli.to
            .and_hms_opt(23, 59, 59)
            .context("end of day out of range")?,
    );
    let viewer = cli.viewer.as_str();

    let store = match &config.store.fixture {
        Some(path) => MemoryStore::from_path(path)
            .with_context(|| format!("Failed to load fixture {path}"))?,
        None => {
            tracing::warn!("No store fixture configured, listing an empty store");
            MemoryStore::new()
        }
    };

    // Every fixture calendar is owned by the viewer.
    let calendars: BTreeSet<String> = store.events().map(|event| event.calendar.clone()).collect();
    let rights = calendars
        .iter()
        .fold(StaticRights::new(), |rights, calendar| {
            rights.grant(calendar, viewer, RightSet::all())
        });

    let service = CalendarService::new(viewer, store, rights, &config);
    let events = service.load_events(&EventListRequest::window(window))?;

    tracing::info!(count = events.len(), "Events listed");

    println!("{}", serde_json::to_string_pretty(&events)?);

    Ok(())
}

fn parse_day(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_arguments() {
        let cli = Cli::try_parse_from(["almanac", "2026-01-01", "2026-01-31"]).expect("parses");
        assert_eq!(cli.from, NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date"));
        assert_eq!(cli.to, NaiveDate::from_ymd_opt(2026, 1, 31).expect("valid date"));
        assert_eq!(cli.viewer, "owner");

        let cli = Cli::try_parse_from(["almanac", "2026-01-01", "2026-01-31", "boss"])
            .expect("parses");
        assert_eq!(cli.viewer, "boss");
    }

    #[test]
    fn test_invalid_dates_and_missing_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["almanac", "2026-13-01", "2026-01-31"]).is_err());
        assert!(Cli::try_parse_from(["almanac", "2026-01-01"]).is_err());
    }
}
