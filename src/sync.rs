//! Settings persistence and change propagation.
//!
//! One writer, any number of observers. Edits are published through a watch
//! channel; a background task persists to disk once the stream of edits has
//! been quiet for a short window, so slider drags collapse into one write.

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

use crate::error::ApiResult;
use crate::model::AutomationConfig;

/// Edits within this window of each other coalesce into one disk write.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Loads and saves the automation settings file.
///
/// Unknown fields in the file are dropped on the next save; missing fields
/// take their defaults, which is what lets older settings files load cleanly.
pub struct SettingsStore {
    filename: Utf8PathBuf,
    last_saved: Mutex<Option<AutomationConfig>>,
}

impl SettingsStore {
    pub fn new(filename: impl Into<Utf8PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            last_saved: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn filename(&self) -> &Utf8Path {
        &self.filename
    }

    /// Read the settings file, or start from defaults when it does not exist
    /// yet. A file that exists but fails to parse is an error; silently
    /// replacing it would lose the user's selection.
    pub async fn load(&self) -> ApiResult<AutomationConfig> {
        if !self.filename.exists() {
            log::debug!("No settings file at {}, using defaults", self.filename);
            return Ok(AutomationConfig::default());
        }

        let yaml = tokio::fs::read_to_string(&self.filename).await?;
        let config: AutomationConfig = serde_yml::from_str(&yaml)?;

        *self.last_saved.lock().await = Some(config.clone());
        Ok(config)
    }

    /// Persist the settings, skipping the write when nothing changed since
    /// the last save. Returns whether a write happened.
    pub async fn save(&self, config: &AutomationConfig) -> ApiResult<bool> {
        let mut last_saved = self.last_saved.lock().await;
        if last_saved.as_ref() == Some(config) {
            return Ok(false);
        }

        let yaml = serde_yml::to_string(config)?;
        tokio::fs::write(&self.filename, yaml).await?;
        log::debug!("Saved settings to {}", self.filename);

        *last_saved = Some(config.clone());
        Ok(true)
    }
}

/// The live settings channel: current value plus change notifications, backed
/// by a debounced writer task.
///
/// Owned by whoever builds the app; dropping it without `shutdown` leaves the
/// last burst of edits unpersisted, so shut it down on exit.
pub struct SyncChannel {
    tx: watch::Sender<AutomationConfig>,
    writer: JoinHandle<()>,
    store: Arc<SettingsStore>,
}

impl SyncChannel {
    /// Load (or default) the settings and start the debounced writer.
    pub async fn start(store: SettingsStore) -> ApiResult<Self> {
        let initial = store.load().await?;
        let store = Arc::new(store);

        let tx = watch::Sender::new(initial);
        let rx = tx.subscribe();
        let writer = tokio::spawn(debounced_writer(rx, store.clone()));

        Ok(Self { tx, writer, store })
    }

    /// The current settings value.
    #[must_use]
    pub fn current(&self) -> AutomationConfig {
        self.tx.borrow().clone()
    }

    /// Publish a whole new settings value to all observers.
    pub fn publish(&self, config: AutomationConfig) {
        self.tx.send_replace(config);
    }

    /// Publish a modification of the current value.
    pub fn update(&self, f: impl FnOnce(&mut AutomationConfig)) {
        self.tx.send_modify(f);
    }

    /// A stream of settings values, starting with the current one.
    #[must_use]
    pub fn observe(&self) -> WatchStream<AutomationConfig> {
        WatchStream::new(self.tx.subscribe())
    }

    /// Stop the writer and flush the latest value to disk.
    pub async fn shutdown(self) -> ApiResult<()> {
        self.writer.abort();

        let latest = self.tx.borrow().clone();
        self.store.save(&latest).await?;
        Ok(())
    }
}

/// Persist after each burst of edits settles. Every change restarts the
/// debounce window; the save happens once the channel has been quiet for the
/// whole window. Save failures are logged and do not stop the task, since the
/// next edit gets another chance.
async fn debounced_writer(
    mut rx: watch::Receiver<AutomationConfig>,
    store: Arc<SettingsStore>,
) {
    while rx.changed().await.is_ok() {
        loop {
            match tokio::time::timeout(DEBOUNCE_WINDOW, rx.changed()).await {
                Ok(Ok(())) => {} // another edit, extend the window
                Ok(Err(_)) | Err(_) => break,
            }
        }

        let config = rx.borrow_and_update().clone();
        if let Err(err) = store.save(&config).await {
            log::error!("Failed to save settings to {}: {err}", store.filename());
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_stream::StreamExt;

    use super::*;

    fn temp_store(name: &str) -> SettingsStore {
        let dir = std::env::temp_dir().join(format!("pauselight-sync-{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.join("settings.yaml")).unwrap();
        let _ = std::fs::remove_file(&path);
        SettingsStore::new(path)
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let store = temp_store("defaults");
        let config = store.load().await.unwrap();
        assert_eq!(config, AutomationConfig::default());
    }

    #[tokio::test]
    async fn save_skips_unchanged_value() {
        let store = temp_store("skip");
        let mut config = AutomationConfig::default();
        config.brightness_percent = 42;

        assert!(store.save(&config).await.unwrap());
        assert!(!store.save(&config).await.unwrap());

        config.brightness_percent = 43;
        assert!(store.save(&config).await.unwrap());
    }

    #[tokio::test]
    async fn load_round_trips_saved_value() {
        let store = temp_store("roundtrip");
        let mut config = AutomationConfig::default();
        config.light_ids.insert("4".to_string());
        config.brightness_percent = 65;

        store.save(&config).await.unwrap();
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn observers_see_current_then_changes() {
        let channel = SyncChannel::start(temp_store("observe")).await.unwrap();
        let mut stream = channel.observe();

        let first = stream.next().await.unwrap();
        assert_eq!(first, AutomationConfig::default());

        channel.update(|config| config.brightness_percent = 10);
        let second = stream.next().await.unwrap();
        assert_eq!(second.brightness_percent, 10);

        channel.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_write() {
        let store = temp_store("debounce");
        let path = store.filename().to_owned();
        let channel = SyncChannel::start(store).await.unwrap();

        // a burst of slider edits, each well inside the debounce window
        for percent in [10, 20, 30, 40] {
            channel.update(|config| config.brightness_percent = percent);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!path.exists(), "no write while edits keep coming");

        // quiescence: the window elapses and the final value lands; the disk
        // write runs on the blocking pool, so poll briefly for it
        tokio::time::sleep(DEBOUNCE_WINDOW + Duration::from_millis(50)).await;
        let mut written = None;
        for _ in 0..100 {
            if path.exists() {
                written = Some(std::fs::read_to_string(&path).unwrap());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let saved: AutomationConfig = serde_yml::from_str(&written.unwrap()).unwrap();
        assert_eq!(saved.brightness_percent, 40);

        channel.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_flushes_latest_value() {
        let store = temp_store("flush");
        let path = store.filename().to_owned();
        let channel = SyncChannel::start(store).await.unwrap();

        channel.update(|config| config.brightness_percent = 77);
        channel.shutdown().await.unwrap();

        let saved: AutomationConfig =
            serde_yml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.brightness_percent, 77);
    }
}
