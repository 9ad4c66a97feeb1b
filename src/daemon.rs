//! Foreground scheduler that keeps downloading due sources.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::app::{AppContext, Result, SmartRssError};
use crate::loader::LoaderEvent;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// How often due sources are checked, in seconds (default: 60)
    pub tick_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { tick_secs: 60 }
    }
}

impl DaemonConfig {
    /// Parse interval string like "30s", "1m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let secs = if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| h * 3600)
                .map_err(|_| format!("Invalid hours: {}", hours))?
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes
                .parse::<u64>()
                .map(|m| m * 60)
                .map_err(|_| format!("Invalid minutes: {}", minutes))?
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>()
                .map(|d| d * 86400)
                .map_err(|_| format!("Invalid days: {}", days))?
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))?
        } else {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '30s', '1m', '1h'", s))?
        };

        if secs == 0 {
            return Err("Interval must be positive".to_string());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs % 86400 == 0 {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self { ctx, config }
    }

    /// Run until Ctrl-C. The run in progress at that point is aborted.
    pub async fn run(&self) -> Result<()> {
        info!(
            tick = %DaemonConfig::format_interval(self.config.tick_secs),
            pid = std::process::id(),
            "smartrss daemon started"
        );

        let mut events = self.ctx.loader.subscribe();
        let mut timer = interval(Duration::from_secs(self.config.tick_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => self.run_update(),
                event = events.recv() => match event {
                    Ok(event) => Self::log_event(&event),
                    Err(RecvError::Lagged(missed)) => debug!(missed, "Missed loader events"),
                    Err(RecvError::Closed) => break,
                },
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|e| SmartRssError::Other(format!("Failed to listen for Ctrl-C: {}", e)))?;
                    info!("Interrupted, stopping");
                    if self.ctx.loader.is_downloading(None) {
                        self.ctx.loader.abort_downloading();
                    }
                    break;
                }
            }
        }

        info!("Daemon shutting down");
        Ok(())
    }

    /// Queue the sources that are due
    fn run_update(&self) {
        match self.ctx.loader.download_all(false) {
            Ok(0) => debug!("No sources due"),
            Ok(queued) => info!(queued, "Queued due sources"),
            Err(e) => warn!(error = %e, "Failed to queue sources"),
        }
    }

    fn log_event(event: &LoaderEvent) {
        match event {
            LoaderEvent::SourceUpdated { source_id, ok: false } => {
                warn!(source_id = %source_id, "Source update failed")
            }
            LoaderEvent::Finished { has_new: true, play_sound } => {
                info!(play_sound, "New items downloaded")
            }
            other => debug!(event = ?other, "Loader event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interval() {
        assert_eq!(DaemonConfig::parse_interval("1h").unwrap(), 3600);
        assert_eq!(DaemonConfig::parse_interval("1m").unwrap(), 60);
        assert_eq!(DaemonConfig::parse_interval("1d").unwrap(), 86400);
        assert_eq!(DaemonConfig::parse_interval("30s").unwrap(), 30);
        assert_eq!(DaemonConfig::parse_interval("90").unwrap(), 90);
        assert!(DaemonConfig::parse_interval("0m").is_err());
        assert!(DaemonConfig::parse_interval("invalid").is_err());
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(DaemonConfig::format_interval(3600), "1h");
        assert_eq!(DaemonConfig::format_interval(60), "1m");
        assert_eq!(DaemonConfig::format_interval(86400), "1d");
        assert_eq!(DaemonConfig::format_interval(90), "90s");
    }
}
