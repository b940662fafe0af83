//! Everything the main window knows, minus the drawing.
//!
//! `ClientState` is only touched from the UI thread. Background work reaches
//! it as [`UiEvent`]s that the window drains and feeds to [`ClientState::apply`].

use std::path::Path;

use eframe::egui;
use rand::Rng;

use crate::bot::{BotController, BotEvent};
use crate::config::{ClientConfig, Settings, JOIN_HINT};
use crate::error::Result;
use crate::events::{EventSink, UiEvent};
use crate::loader::{self, ImageLoadTask};
use crate::pool::WorkerPool;

/// Advisory display state. Control enablement follows `status_changed` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Starting,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialog {
    ConfigError,
    ConfirmNoUsername,
    StartFailed,
}

impl Dialog {
    pub fn title(&self) -> &'static str {
        match self {
            Dialog::ConfigError => "Configuration Error",
            Dialog::ConfirmNoUsername => "No Username",
            Dialog::StartFailed => "Start Failed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Dialog::ConfigError => "Please select an image folder.",
            Dialog::ConfirmNoUsername => "No target username specified. Continue anyway?",
            Dialog::StartFailed => "The bot could not be started. Check the log for details.",
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self, Dialog::ConfirmNoUsername)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakingLine {
    pub text: String,
    /// Drawn green and bold while true.
    pub highlighted: bool,
}

impl SpeakingLine {
    fn neutral() -> Self {
        Self {
            text: "Speaking: N/A".to_owned(),
            highlighted: false,
        }
    }
}

pub const STATUS_STOPPED: &str = "Bot Stopped";
pub const STATUS_STARTING: &str = "Bot Starting...";
pub const STATUS_RUNNING: &str = "Bot Running";

pub struct ClientState<T> {
    pub settings: Settings,
    config: ClientConfig,
    controller: Box<dyn BotController>,
    pool: WorkerPool,
    sink: EventSink,

    // Bumped per folder selection so late results from an old folder are dropped.
    generation: u64,
    gallery: Vec<T>,
    displayed: Option<usize>,

    run_state: RunState,
    bot_running: bool,
    status_text: String,
    speaking: SpeakingLine,
    log: Vec<String>,
    scroll_log: bool,
    dialog: Option<Dialog>,
}

impl<T> ClientState<T> {
    pub fn new(
        config: ClientConfig,
        controller: Box<dyn BotController>,
        pool: WorkerPool,
        sink: EventSink,
    ) -> Self {
        Self {
            settings: Settings::default(),
            config,
            controller,
            pool,
            sink,
            generation: 0,
            gallery: Vec::new(),
            displayed: None,
            run_state: RunState::Stopped,
            bot_running: false,
            status_text: STATUS_STOPPED.to_owned(),
            speaking: SpeakingLine::neutral(),
            log: Vec::new(),
            scroll_log: false,
            dialog: None,
        }
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Last value received through `status_changed`.
    pub fn bot_running(&self) -> bool {
        self.bot_running
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn speaking(&self) -> &SpeakingLine {
        &self.speaking
    }

    pub fn log_lines(&self) -> &[String] {
        &self.log
    }

    pub fn gallery(&self) -> &[T] {
        &self.gallery
    }

    pub fn displayed_image(&self) -> Option<&T> {
        self.displayed.and_then(|i| self.gallery.get(i))
    }

    pub fn dialog(&self) -> Option<Dialog> {
        self.dialog
    }

    /// True once after new log output, so the view can jump to the end.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_log)
    }

    /// Switch to a new image folder and queue one load per supported file.
    pub fn select_folder(&mut self, folder: &Path) -> Result<usize> {
        if folder.as_os_str().is_empty() {
            return Ok(0);
        }

        self.settings.image_folder = folder.display().to_string();
        self.gallery.clear();
        self.displayed = None;
        self.generation += 1;

        let dropped = self.pool.cancel_pending();
        if dropped > 0 {
            log::debug!("dropped {} queued loads from the previous folder", dropped);
        }

        let files = match loader::list_images(folder) {
            Ok(files) => files,
            Err(e) => {
                self.append_log(&format!("Could not read image folder: {}", e));
                return Err(e);
            }
        };
        let mut submitted = 0;
        for path in files {
            let task = ImageLoadTask {
                path,
                generation: self.generation,
                max_side: self.config.max_image_side,
                sink: self.sink.clone(),
            };
            if self.pool.submit(move || task.run()) {
                submitted += 1;
            }
        }

        log::info!(
            "queued {} image loads from {}",
            submitted,
            self.settings.image_folder
        );
        Ok(submitted)
    }

    /// Start button. May open a dialog instead of starting.
    pub fn request_start(&mut self) {
        if self.settings.image_folder.is_empty() {
            self.dialog = Some(Dialog::ConfigError);
            return;
        }
        if self.settings.target_username().is_none() {
            self.dialog = Some(Dialog::ConfirmNoUsername);
            return;
        }
        self.launch();
    }

    /// Answer to the "No Username" question.
    pub fn confirm_start(&mut self, proceed: bool) {
        self.dialog = None;
        if proceed {
            self.launch();
        }
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = None;
    }

    fn launch(&mut self) {
        self.controller.set_exe_path(&self.config.exe_path);
        self.status_text = STATUS_STARTING.to_owned();

        let username = self.settings.target_username().map(str::to_owned);
        if self.controller.start(username.as_deref(), self.config.port) {
            self.run_state = RunState::Starting;
        } else {
            log::warn!("bot controller refused to start");
            self.status_text = STATUS_STOPPED.to_owned();
            self.run_state = RunState::Stopped;
            self.append_log("Bot failed to start");
            self.dialog = Some(Dialog::StartFailed);
        }
    }

    /// Stop button. Resets the display without waiting for the controller.
    pub fn stop(&mut self) {
        self.controller.stop();
        self.status_text = STATUS_STOPPED.to_owned();
        self.run_state = RunState::Stopped;
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Route one queued event. `upload` turns a decoded bitmap into whatever
    /// the gallery stores; it is only called for results of the current folder.
    pub fn apply(&mut self, event: UiEvent, upload: impl FnOnce(egui::ColorImage) -> T) {
        match event {
            UiEvent::ImageLoaded { generation, image } => {
                if generation == self.generation {
                    self.gallery.push(upload(image));
                }
            }
            UiEvent::Bot(BotEvent::SpeakingUpdate { username, speaking }) => {
                self.on_speaking_update(&username, speaking)
            }
            UiEvent::Bot(BotEvent::LogMessage(text)) => self.on_log_message(&text),
            UiEvent::Bot(BotEvent::StatusChanged(running)) => self.on_status_changed(running),
        }
    }

    pub fn on_speaking_update(&mut self, username: &str, speaking: bool) {
        self.speaking = SpeakingLine {
            text: format!(
                "Speaking: {} is {}",
                username,
                if speaking { "speaking" } else { "silent" }
            ),
            highlighted: speaking,
        };

        if speaking && !self.gallery.is_empty() {
            self.displayed = Some(rand::thread_rng().gen_range(0..self.gallery.len()));
        }
    }

    pub fn on_log_message(&mut self, text: &str) {
        self.append_log(text);

        if text.contains(&self.config.login_marker) {
            self.status_text = JOIN_HINT.to_owned();
            self.run_state = RunState::Running;
        } else if text.contains(&self.config.started_marker) && self.run_state == RunState::Starting {
            self.status_text = STATUS_RUNNING.to_owned();
            self.run_state = RunState::Running;
        }
    }

    pub fn on_status_changed(&mut self, running: bool) {
        self.bot_running = running;
        if !running {
            self.speaking = SpeakingLine::neutral();
            self.status_text = STATUS_STOPPED.to_owned();
            self.run_state = RunState::Stopped;
        }
    }

    fn append_log(&mut self, text: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log.push(format!("[{}] {}", stamp, text));
        self.scroll_log = true;
    }

    /// Window close: release the bot, then drain the loader pool.
    pub fn shutdown(&mut self) {
        log::info!("shutting down client");
        self.controller.cleanup();
        self.pool.shutdown();
    }
}
