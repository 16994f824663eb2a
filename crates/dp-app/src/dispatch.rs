use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use dp_core::config::{DispatchConfig, DispatchMode, RemoteAction};
use dp_core::frame::{Direction, DirectionEvent};
use dp_core::traits::CommandDispatcher;

/// Capacité du canal tracker → worker.
pub const DISPATCH_QUEUE: usize = 8;

/// Action configured for `direction`.
#[must_use]
pub fn action_for(direction: Direction, config: &DispatchConfig) -> RemoteAction {
    match direction {
        Direction::Toward => config.toward_action,
        Direction::Away => config.away_action,
    }
}

/// Logs the event and the action it would trigger. Never fails.
#[derive(Debug, Default)]
pub struct LogDispatcher {
    config: DispatchConfig,
}

impl LogDispatcher {
    #[must_use]
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }
}

impl CommandDispatcher for LogDispatcher {
    fn dispatch(&mut self, event: &DirectionEvent) -> Result<()> {
        log::info!(
            "[{:.2}s] {} ({:+.1} Hz) → {:?}",
            event.timestamp,
            event.direction,
            event.smoothed_shift,
            action_for(event.direction, &self.config)
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Runs an AppleScript on a remote Mac over ssh.
///
/// Non-interactive: `BatchMode` forbids password prompts, so key-based
/// authentication must already be set up.
#[derive(Debug)]
pub struct SshDispatcher {
    config: DispatchConfig,
    destination: String,
}

impl SshDispatcher {
    /// # Errors
    /// Returns an error if `config.ssh_host` is empty.
    pub fn new(config: DispatchConfig) -> Result<Self> {
        if config.ssh_host.is_empty() {
            anyhow::bail!("SshDispatcher : ssh_host manquant");
        }
        let destination = if config.ssh_user.is_empty() {
            config.ssh_host.clone()
        } else {
            format!("{}@{}", config.ssh_user, config.ssh_host)
        };
        Ok(Self {
            config,
            destination,
        })
    }

    /// `user@host`, or `host` alone.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl CommandDispatcher for SshDispatcher {
    fn dispatch(&mut self, event: &DirectionEvent) -> Result<()> {
        let action = action_for(event.direction, &self.config);
        let Some(script) = remote_script(action, &self.config) else {
            log::debug!("{} : aucune action configurée", event.direction);
            return Ok(());
        };

        let output = Command::new("ssh")
            .args([
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=5",
                self.destination.as_str(),
                script.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .context("Impossible de lancer ssh")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "ssh {} a échoué ({}) : {}",
                self.destination,
                output.status,
                stderr.trim()
            );
        }
        log::info!("{action:?} envoyé à {}", self.destination);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ssh"
    }
}

/// Remote shell command line for `action`, or `None` for `RemoteAction::None`.
///
/// # Example
/// ```
/// use dp_app::dispatch::remote_script;
/// use dp_core::config::{DispatchConfig, RemoteAction};
///
/// let script = remote_script(RemoteAction::Copy, &DispatchConfig::default()).unwrap();
/// assert!(script.starts_with("osascript -e 'tell application \"Notes\" to activate'"));
/// assert!(script.contains("keystroke \"c\" using {command down}"));
/// ```
#[must_use]
pub fn remote_script(action: RemoteAction, config: &DispatchConfig) -> Option<String> {
    let statements = match action {
        RemoteAction::Copy => keystroke(&config.target_app, 'c'),
        RemoteAction::Paste => keystroke(&config.target_app, 'v'),
        RemoteAction::OpenUrl => vec![format!(
            "tell application {} to open location {}",
            applescript_string(&config.browser_app),
            applescript_string(&config.url)
        )],
        RemoteAction::None => return None,
    };

    let mut cmd = String::from("osascript");
    for statement in &statements {
        cmd.push_str(" -e ");
        cmd.push_str(&shell_quote(statement));
    }
    Some(cmd)
}

fn keystroke(app: &str, key: char) -> Vec<String> {
    vec![
        format!("tell application {} to activate", applescript_string(app)),
        format!("tell application \"System Events\" to keystroke \"{key}\" using {{command down}}"),
    ]
}

/// AppleScript string literal.
fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// POSIX single-quoted word for the remote shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Dispatcher selected by `config.mode`.
///
/// # Errors
/// Returns an error if the ssh dispatcher cannot be configured.
pub fn build_dispatcher(config: &DispatchConfig) -> Result<Box<dyn CommandDispatcher>> {
    Ok(match config.mode {
        DispatchMode::Log => Box::new(LogDispatcher::new(config.clone())),
        DispatchMode::Ssh => Box::new(SshDispatcher::new(config.clone())?),
    })
}

/// Tracker-side dispatcher: queues events for the worker thread.
///
/// Never blocks the tracker. A full queue drops the event with a warning.
pub struct ChannelDispatcher {
    tx: flume::Sender<DirectionEvent>,
}

impl ChannelDispatcher {
    #[must_use]
    pub fn new(tx: flume::Sender<DirectionEvent>) -> Self {
        Self { tx }
    }
}

impl CommandDispatcher for ChannelDispatcher {
    fn dispatch(&mut self, event: &DirectionEvent) -> Result<()> {
        match self.tx.try_send(*event) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(dropped)) => {
                log::warn!("File de dispatch pleine, {} ignoré", dropped.direction);
                Ok(())
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                anyhow::bail!("Worker de dispatch arrêté")
            }
        }
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Spawn the worker that hands queued events to `inner`.
///
/// Runs until every sender is dropped, draining what is left in the queue.
/// Returns the number of events delivered successfully.
///
/// # Errors
/// Returns an error if the thread cannot be spawned.
pub fn spawn_dispatch_worker(
    rx: flume::Receiver<DirectionEvent>,
    mut inner: Box<dyn CommandDispatcher>,
) -> Result<JoinHandle<u64>> {
    let handle = thread::Builder::new()
        .name("dp-dispatch".to_string())
        .spawn(move || {
            let mut delivered = 0;
            for event in rx.iter() {
                match inner.dispatch(&event) {
                    Ok(()) => delivered += 1,
                    Err(e) => log::warn!("Dispatch {} échoué : {e:#}", inner.name()),
                }
            }
            log::debug!("Worker de dispatch terminé ({delivered} livré(s))");
            delivered
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn event(direction: Direction) -> DirectionEvent {
        DirectionEvent {
            direction,
            timestamp: 1.0,
            smoothed_shift: 12.0,
        }
    }

    struct Shared {
        seen: Arc<Mutex<Vec<Direction>>>,
        fail_away: bool,
    }

    impl CommandDispatcher for Shared {
        fn dispatch(&mut self, event: &DirectionEvent) -> Result<()> {
            if self.fail_away && event.direction == Direction::Away {
                anyhow::bail!("refusé");
            }
            self.seen.lock().unwrap().push(event.direction);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "shared"
        }
    }

    #[test]
    fn copy_and_paste_scripts() {
        let config = DispatchConfig::default();
        assert_eq!(
            remote_script(RemoteAction::Paste, &config).unwrap(),
            "osascript -e 'tell application \"Notes\" to activate' \
             -e 'tell application \"System Events\" to keystroke \"v\" using {command down}'"
        );
        let copy = remote_script(RemoteAction::Copy, &config).unwrap();
        assert!(copy.ends_with("keystroke \"c\" using {command down}'"));
    }

    #[test]
    fn open_url_script() {
        let config = DispatchConfig::default();
        assert_eq!(
            remote_script(RemoteAction::OpenUrl, &config).unwrap(),
            "osascript -e 'tell application \"Google Chrome\" to open location \"https://www.youtube.com\"'"
        );
        assert_eq!(remote_script(RemoteAction::None, &config), None);
    }

    #[test]
    fn quotes_are_escaped() {
        let config = DispatchConfig {
            target_app: "Bob's \"Notes\"".into(),
            ..DispatchConfig::default()
        };
        let script = remote_script(RemoteAction::Copy, &config).unwrap();
        assert!(script.contains(r#"tell application "Bob'\''s \"Notes\"" to activate"#));
    }

    #[test]
    fn default_actions_per_direction() {
        let config = DispatchConfig::default();
        assert_eq!(action_for(Direction::Toward, &config), RemoteAction::Paste);
        assert_eq!(action_for(Direction::Away, &config), RemoteAction::Copy);
    }

    #[test]
    fn ssh_destination() {
        let config = DispatchConfig {
            mode: DispatchMode::Ssh,
            ssh_user: "alice".into(),
            ssh_host: "mac.local".into(),
            ..DispatchConfig::default()
        };
        assert_eq!(SshDispatcher::new(config).unwrap().destination(), "alice@mac.local");
        assert!(SshDispatcher::new(DispatchConfig::default()).is_err());
    }

    #[test]
    fn ssh_with_no_action_does_not_spawn() {
        let mut d = SshDispatcher::new(DispatchConfig {
            ssh_host: "unreachable.invalid".into(),
            toward_action: RemoteAction::None,
            ..DispatchConfig::default()
        })
        .unwrap();
        assert!(d.dispatch(&event(Direction::Toward)).is_ok());
    }

    #[test]
    fn build_dispatcher_follows_mode() {
        let d = build_dispatcher(&DispatchConfig::default()).unwrap();
        assert_eq!(d.name(), "log");
        let ssh = DispatchConfig {
            mode: DispatchMode::Ssh,
            ssh_host: "h".into(),
            ..DispatchConfig::default()
        };
        assert_eq!(build_dispatcher(&ssh).unwrap().name(), "ssh");
    }

    #[test]
    fn worker_drains_queue_and_survives_failures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = flume::bounded(DISPATCH_QUEUE);
        let mut front = ChannelDispatcher::new(tx);
        for d in [Direction::Toward, Direction::Away, Direction::Toward] {
            front.dispatch(&event(d)).unwrap();
        }
        let inner = Box::new(Shared {
            seen: Arc::clone(&seen),
            fail_away: true,
        });
        let handle = spawn_dispatch_worker(rx, inner).unwrap();
        drop(front);

        assert_eq!(handle.join().unwrap(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![Direction::Toward, Direction::Toward]);
    }

    #[test]
    fn full_queue_drops_without_error() {
        let (tx, rx) = flume::bounded(1);
        let mut front = ChannelDispatcher::new(tx);
        assert!(front.dispatch(&event(Direction::Toward)).is_ok());
        assert!(front.dispatch(&event(Direction::Away)).is_ok());
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv().unwrap().direction, Direction::Toward);
    }

    #[test]
    fn disconnected_worker_is_an_error() {
        let (tx, rx) = flume::bounded(1);
        drop(rx);
        let mut front = ChannelDispatcher::new(tx);
        assert!(front.dispatch(&event(Direction::Toward)).is_err());
    }
}
