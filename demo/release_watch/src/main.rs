use argus_core::domains::stats::StatsKey;
use argus_core::{Argus, ArgusConfig};
use serde_json::Value;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,argus_core=info,release_watch=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = ArgusConfig::load()?;
    info!(target = "release_watch", base_url = %cfg.base_url, "Starting release watcher");
    let argus = Argus::new(cfg)?;

    let releases: Vec<String> = std::env::var("ARGUS_WATCH_RELEASES")
        .unwrap_or_else(|_| "master".to_string())
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    let added = argus
        .stats
        .register_all(releases.iter().cloned().map(StatsKey::release));
    info!(target = "release_watch", releases = ?releases, added, "Watching releases");

    let mut stats = argus.stats.subscribe();
    let mut alerts = argus.alerts.subscribe();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!(target = "release_watch", "Ctrl-C received; shutting down");
                break;
            }
            snap = stats.changed() => {
                let Some(snap) = snap else { break };
                for release in &releases {
                    match snap.get(release) {
                        Some(entry) => info!(
                            target = "release_watch",
                            release = %release,
                            revision = snap.revision,
                            summary = %summarize(entry),
                            "Stats updated"
                        ),
                        None => warn!(target = "release_watch", release = %release, "No stats returned"),
                    }
                }
            }
            alert = alerts.recv() => match alert {
                Ok(alert) => error!(target = "release_watch", source = %alert.source, "{}", alert.message),
                Err(RecvError::Lagged(n)) => warn!(target = "release_watch", skipped = n, "Alerts dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    argus.shutdown();
    let s = argus.stats.stats();
    info!(
        target = "release_watch",
        succeeded = s.fetches_succeeded,
        failed = s.fetches_failed,
        skipped = s.fetches_skipped,
        "Stopped"
    );
    Ok(())
}

/// Compact one-line view of a release stats entry
fn summarize(entry: &Value) -> String {
    match entry.as_object() {
        Some(fields) => fields
            .iter()
            .filter(|(_, v)| v.is_number() || v.is_string() || v.is_boolean())
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" "),
        None => entry.to_string(),
    }
}
