//! Configuration file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Quiet period before a burst of file events triggers one reload
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Config watcher that monitors file changes and sends reload notifications
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    reload_task: JoinHandle<()>,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load the config file and start watching it
    pub async fn new(config_path: String) -> Result<(Self, AppConfig)> {
        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;

        // notify callbacks run on their own OS thread; an unbounded sender
        // works from there without a runtime handle
        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Editors often save by replace, which shows up as a create
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    debug!("Config file changed: {:?}", event.paths);
                    let _ = event_tx.send(());
                }
            }
            Err(e) => error!("Watch error: {}", e),
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        let (tx, rx) = mpsc::channel(10);
        let reload_task = tokio::spawn(reload_loop(config_path.clone(), event_rx, tx));

        info!("Config file watcher started for: {}", config_path);

        Ok((
            Self {
                _watcher: watcher,
                reload_task,
                rx,
            },
            initial_config,
        ))
    }

    /// Wait for the next config update
    /// Returns None if the watcher has been closed
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.reload_task.abort();
    }
}

async fn reload_loop(
    config_path: String,
    mut events: mpsc::UnboundedReceiver<()>,
    tx: mpsc::Sender<AppConfig>,
) {
    while events.recv().await.is_some() {
        // Collapse the burst of events a single save produces
        loop {
            match tokio::time::timeout(DEBOUNCE, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        match AppConfig::load(&config_path).await {
            Ok(new_config) => {
                info!("Configuration reloaded successfully");
                if tx.send(new_config).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!("Failed to reload config (keeping old config): {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_watcher_basic() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("test-config.yaml");

        fs::write(&config_path, "console:\n  host: \"10.0.0.5\"\n  port: 8000\n")?;

        let (mut watcher, config) =
            ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;

        assert_eq!(config.console.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(config.console.port, 8000);

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, "console:\n  host: \"10.0.0.6\"\n  port: 8010\n")?;

        // Wait for reload (with timeout)
        let new_config = tokio::time::timeout(Duration::from_secs(2), watcher.next_config()).await?;

        if let Some(new_config) = new_config {
            assert_eq!(new_config.console.host.as_deref(), Some("10.0.0.6"));
            assert_eq!(new_config.console.port, 8010);
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_config_watcher_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("absent.yaml");
        assert!(ConfigWatcher::new(missing.to_string_lossy().to_string())
            .await
            .is_err());
    }
}
