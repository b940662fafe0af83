use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver};
use serde::Deserialize;

use crate::events::EventSink;

/// Notifications coming out of a bot controller.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    SpeakingUpdate { username: String, speaking: bool },
    LogMessage(String),
    StatusChanged(bool),
}

/// Whatever launches and supervises the detection bot.
///
/// Implementations report back asynchronously through the [`EventSink`]
/// they were built with, never through return values.
pub trait BotController {
    fn set_exe_path(&mut self, path: &str);
    /// Returns true when the launch was kicked off.
    fn start(&mut self, target_username: Option<&str>, port: u16) -> bool;
    fn stop(&mut self);
    /// Stop the bot and release every thread and handle held for it.
    fn cleanup(&mut self);
    fn is_running(&self) -> bool;
}

#[derive(Deserialize)]
struct SpeakingPayload {
    username: Option<String>,
    speaking: Option<bool>,
}

/// Turn one line of bot stdout into an event. JSON speaking reports become
/// `SpeakingUpdate`, everything else is passed through as a log line.
pub fn parse_line(line: &str) -> BotEvent {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        if let Ok(payload) = serde_json::from_str::<SpeakingPayload>(trimmed) {
            if payload.username.is_some() || payload.speaking.is_some() {
                return BotEvent::SpeakingUpdate {
                    username: payload.username.unwrap_or_else(|| "Unknown".to_owned()),
                    speaking: payload.speaking.unwrap_or(false),
                };
            }
        }
    }
    BotEvent::LogMessage(line.to_owned())
}

fn lock_child(child: &Mutex<Option<Child>>) -> MutexGuard<'_, Option<Child>> {
    match child.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// How often the exit watcher checks on the bot process.
const EXIT_POLL: Duration = Duration::from_millis(50);

/// Runs the bot as a child process and relays its output.
///
/// Process exit, not pipe closure, decides when `StatusChanged(false)` is
/// sent. Whoever takes the child out of the shared slot reports the exit, so
/// it is reported exactly once.
pub struct ProcessBotController {
    exe_path: String,
    sink: EventSink,
    child: Arc<Mutex<Option<Child>>>,
    waiter: Option<JoinHandle<()>>,
}

impl ProcessBotController {
    pub fn new(sink: EventSink) -> Self {
        Self {
            exe_path: String::new(),
            sink,
            child: Arc::new(Mutex::new(None)),
            waiter: None,
        }
    }

    fn join_waiter(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            if waiter.join().is_err() {
                log::error!("bot exit watcher panicked");
            }
        }
    }

    fn spawn(&mut self, target_username: Option<&str>, port: u16) -> anyhow::Result<u32> {
        let mut cmd = Command::new(&self.exe_path);
        cmd.arg("--port").arg(port.to_string());
        if let Some(name) = target_username {
            cmd.arg("--username").arg(name);
        }

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to launch {}", self.exe_path))?;

        let pid = child.id();
        let (stdout, stderr) = (child.stdout.take(), child.stderr.take());
        *lock_child(&self.child) = Some(child);

        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            self.abort_launch();
            anyhow::bail!("bot output was not captured");
        };

        // Relay threads hold off until the start events are queued, so the
        // window never sees output or an exit before `StatusChanged(true)`.
        let (go_tx, go_rx) = unbounded::<()>();
        let waiter = match self.spawn_relays(go_rx, stdout, stderr) {
            Ok(waiter) => waiter,
            Err(e) => {
                drop(go_tx);
                self.abort_launch();
                return Err(e);
            }
        };
        self.waiter = Some(waiter);

        self.sink.bot(BotEvent::LogMessage(format!(
            "Bot started (pid {}) on port {}",
            pid, port
        )));
        self.sink.bot(BotEvent::StatusChanged(true));
        for _ in 0..3 {
            let _ = go_tx.send(());
        }

        Ok(pid)
    }

    /// Start the stdout/stderr readers and the exit watcher. Each one waits
    /// for a go signal and quits silently if the sender is dropped instead.
    fn spawn_relays(
        &self,
        go: Receiver<()>,
        stdout: ChildStdout,
        stderr: ChildStderr,
    ) -> anyhow::Result<JoinHandle<()>> {
        // Readers are detached: a grandchild can keep the pipes open long
        // after the bot itself is gone.
        let sink = self.sink.clone();
        let gate = go.clone();
        thread::Builder::new()
            .name("bot-stdout".into())
            .spawn(move || {
                if gate.recv().is_ok() {
                    relay_lines(stdout, &sink, parse_line);
                }
            })
            .context("failed to spawn stdout reader")?;

        let sink = self.sink.clone();
        let gate = go.clone();
        thread::Builder::new()
            .name("bot-stderr".into())
            .spawn(move || {
                if gate.recv().is_ok() {
                    relay_lines(stderr, &sink, |line| BotEvent::LogMessage(line.to_owned()));
                }
            })
            .context("failed to spawn stderr reader")?;

        let sink = self.sink.clone();
        let child = self.child.clone();
        thread::Builder::new()
            .name("bot-waiter".into())
            .spawn(move || {
                if go.recv().is_ok() {
                    watch_exit(&child, &sink);
                }
            })
            .context("failed to spawn exit watcher")
    }

    /// Kill and forget a child whose launch could not be completed. No
    /// events are sent since the window was never told it started.
    fn abort_launch(&mut self) {
        let taken = lock_child(&self.child).take();
        if let Some(mut child) = taken {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.join_waiter();
    }
}

fn relay_lines(input: impl Read, sink: &EventSink, to_event: fn(&str) -> BotEvent) {
    for line in BufReader::new(input).lines().map_while(|l| l.ok()) {
        sink.bot(to_event(&line));
    }
}

fn report_exit(sink: &EventSink, status: std::io::Result<ExitStatus>) {
    match status {
        Ok(status) => {
            log::info!("bot exited with {}", status);
            sink.bot(BotEvent::LogMessage(format!("Bot exited ({})", status)));
        }
        Err(e) => log::warn!("failed to wait for bot process: {}", e),
    }
    sink.bot(BotEvent::StatusChanged(false));
}

/// Poll the child until it exits on its own. Returns quietly once `stop`
/// has taken the child.
fn watch_exit(child: &Mutex<Option<Child>>, sink: &EventSink) {
    loop {
        let exited = {
            let mut guard = lock_child(child);
            let Some(process) = guard.as_mut() else {
                return;
            };
            match process.try_wait() {
                Ok(None) => None,
                Ok(Some(status)) => {
                    guard.take();
                    Some(Ok(status))
                }
                Err(e) => {
                    guard.take();
                    Some(Err(e))
                }
            }
        };

        if let Some(status) = exited {
            report_exit(sink, status);
            return;
        }
        thread::sleep(EXIT_POLL);
    }
}

impl BotController for ProcessBotController {
    fn set_exe_path(&mut self, path: &str) {
        self.exe_path = path.to_owned();
    }

    fn start(&mut self, target_username: Option<&str>, port: u16) -> bool {
        if self.is_running() {
            log::warn!("start requested while the bot is already running");
            return false;
        }
        self.join_waiter();

        match self.spawn(target_username, port) {
            Ok(pid) => {
                log::info!("launched {} as pid {}", self.exe_path, pid);
                true
            }
            Err(e) => {
                log::warn!("{:#}", e);
                self.sink
                    .bot(BotEvent::LogMessage(format!("Failed to start bot: {:#}", e)));
                false
            }
        }
    }

    fn stop(&mut self) {
        let taken = lock_child(&self.child).take();
        if let Some(mut child) = taken {
            log::info!("stopping bot pid {}", child.id());
            if let Err(e) = child.kill() {
                log::warn!("failed to kill bot process: {}", e);
            }
            report_exit(&self.sink, child.wait());
        }
    }

    fn cleanup(&mut self) {
        self.stop();
        self.join_waiter();
    }

    fn is_running(&self) -> bool {
        lock_child(&self.child).is_some()
    }
}

impl Drop for ProcessBotController {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::UiEvent;
    use std::time::Instant;

    fn wait_for_stop(rx: &Receiver<UiEvent>) -> Vec<bool> {
        let mut statuses = Vec::new();
        while statuses.last() != Some(&false) {
            if let UiEvent::Bot(BotEvent::StatusChanged(running)) =
                rx.recv_timeout(Duration::from_secs(10)).unwrap()
            {
                statuses.push(running);
            }
        }
        statuses
    }

    #[test]
    fn json_speaking_lines_become_speaking_updates() {
        assert_eq!(
            parse_line(r#"{"username": "alice", "speaking": true}"#),
            BotEvent::SpeakingUpdate {
                username: "alice".into(),
                speaking: true
            }
        );
        assert_eq!(
            parse_line(r#"  {"speaking": false}"#),
            BotEvent::SpeakingUpdate {
                username: "Unknown".into(),
                speaking: false
            }
        );
    }

    #[test]
    fn other_lines_are_log_messages() {
        for line in ["Bot started", "{not json", "{}", r#"{"other": 1}"#, ""] {
            assert_eq!(parse_line(line), BotEvent::LogMessage(line.to_owned()));
        }
    }

    #[test]
    fn missing_executable_fails_to_start() {
        let (sink, rx) = EventSink::channel(None);
        let mut controller = ProcessBotController::new(sink);
        controller.set_exe_path("./definitely-not-a-real-bot-binary");

        assert!(!controller.start(Some("alice"), 3001));
        assert!(!controller.is_running());
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            UiEvent::Bot(BotEvent::LogMessage(m)) if m.starts_with("Failed to start bot")
        ));
        controller.cleanup();
    }

    #[cfg(unix)]
    #[test]
    fn short_lived_process_reports_start_and_stop() {
        let (sink, rx) = EventSink::channel(None);
        let mut controller = ProcessBotController::new(sink);
        controller.set_exe_path("true");
        assert!(controller.start(None, 3001));

        assert_eq!(wait_for_stop(&rx), vec![true, false]);

        controller.cleanup();
        assert!(!controller.is_running());
    }

    #[cfg(unix)]
    #[test]
    fn stop_reports_exit_even_when_a_grandchild_holds_the_pipes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("bot.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 20 &\necho hello\nsleep 20\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (sink, rx) = EventSink::channel(None);
        let mut controller = ProcessBotController::new(sink);
        controller.set_exe_path(script.to_str().unwrap());

        // A freshly written script can briefly be busy while other tests fork.
        let mut started = false;
        for _ in 0..10 {
            if controller.start(None, 3001) {
                started = true;
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
        assert!(started);

        loop {
            if let UiEvent::Bot(BotEvent::LogMessage(m)) =
                rx.recv_timeout(Duration::from_secs(10)).unwrap()
            {
                if m == "hello" {
                    break;
                }
            }
        }

        let begin = Instant::now();
        controller.cleanup();
        assert!(begin.elapsed() < Duration::from_secs(5));
        assert!(!controller.is_running());

        let saw_stop = rx
            .try_iter()
            .any(|e| matches!(e, UiEvent::Bot(BotEvent::StatusChanged(false))));
        assert!(saw_stop);
    }

    #[cfg(unix)]
    #[test]
    fn abandoned_launch_stays_silent() {
        let (sink, rx) = EventSink::channel(None);
        let mut controller = ProcessBotController::new(sink);

        let mut child = Command::new("echo")
            .arg("hi")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let stdout = child.stdout.take().unwrap();
        let stderr = child.stderr.take().unwrap();
        *lock_child(&controller.child) = Some(child);

        let (go_tx, go_rx) = unbounded::<()>();
        controller.waiter = Some(controller.spawn_relays(go_rx, stdout, stderr).unwrap());
        drop(go_tx);
        controller.abort_launch();

        thread::sleep(Duration::from_millis(200));
        assert!(!controller.is_running());
        assert!(rx.try_recv().is_err());
    }
}
