//! Configuration file watcher.
//!
//! Watches the directory holding the file rather than the file itself: editors
//! commonly save by writing a temporary file and renaming it over the original,
//! which drops a watch placed on the old inode.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::ServerConfig;

/// Sends a freshly validated [`ServerConfig`] whenever the file's content
/// changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ServerConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path` and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Watching stops when the returned watcher is dropped.
    pub fn run(self) -> notify::Result<RecommendedWatcher> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(ToOwned::to_owned);
        let mut reload = Reload {
            path: self.path.clone(),
            last: fs::read_to_string(&self.path).ok(),
            tx: self.update_tx,
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, file_name.as_ref()) => reload.run(),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `event` writes or creates the watched file.
fn touches(event: &Event, file_name: Option<&OsString>) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    file_name.is_some_and(|want| event.paths.iter().any(|p| p.file_name() == Some(want.as_os_str())))
}

struct Reload {
    path: PathBuf,
    /// Content of the last load attempt.
    last: Option<String>,
    tx: mpsc::UnboundedSender<ServerConfig>,
}

impl Reload {
    fn run(&mut self) {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            // mid-rename; the create event that follows reloads
            Err(e) => {
                tracing::debug!(path = ?self.path, error = %e, "Config file unreadable");
                return;
            }
        };
        if self.last.as_deref() == Some(content.as_str()) {
            return;
        }

        tracing::info!(path = ?self.path, "Config file change detected, reloading");
        match parse_config(&content) {
            Ok(config) => {
                let _ = self.tx.send(config);
            }
            Err(e) => tracing::error!(error = %e, "Failed to reload config, keeping current routes"),
        }
        self.last = Some(content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("radix-router-watch-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn next_with_routes(updates: &mut mpsc::UnboundedReceiver<ServerConfig>) -> ServerConfig {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match updates.recv().await {
                    Some(config) if !config.routes.is_empty() => break config,
                    Some(_) => continue,
                    None => panic!("watcher channel closed"),
                }
            }
        })
        .await
        .expect("no reload within 10s")
    }

    #[tokio::test]
    async fn test_reload_on_change() {
        let dir = temp_dir();
        let path = dir.join("router.toml");
        fs::write(&path, "").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();

        fs::write(&path, "[[routes]]\npath = \"/reloaded\"\n").unwrap();

        let config = next_with_routes(&mut updates).await;
        assert_eq!(config.routes[0].path, "/reloaded");
        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_reload_on_rename_over() {
        let dir = temp_dir();
        let path = dir.join("router.toml");
        fs::write(&path, "").unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _guard = watcher.run().unwrap();

        let staged = dir.join(".router.toml.swp");
        fs::write(&staged, "[[routes]]\npath = \"/renamed\"\n").unwrap();
        fs::rename(&staged, &path).unwrap();

        let config = next_with_routes(&mut updates).await;
        assert_eq!(config.routes[0].path, "/renamed");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_touches_only_the_watched_file() {
        use notify::event::{CreateKind, EventKind, RemoveKind};

        let name = OsString::from("router.toml");
        let create = |p: &str| Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from(p));

        assert!(touches(&create("/etc/app/router.toml"), Some(&name)));
        assert!(!touches(&create("/etc/app/other.toml"), Some(&name)));

        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(PathBuf::from("/etc/app/router.toml"));
        assert!(!touches(&remove, Some(&name)));
    }
}
