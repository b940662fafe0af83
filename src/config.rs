/// Fixed values the client hands to the bot controller and the loader pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub exe_path: String,
    pub port: u16,
    pub loader_workers: usize,
    /// Decoded images are scaled to fit inside this square.
    pub max_image_side: u32,
    pub login_marker: String,
    pub started_marker: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            exe_path: "DCAUD.exe".to_owned(),
            port: 3001,
            loader_workers: 4,
            max_image_side: 400,
            login_marker: "Logged in as DCAudioDetection#5665".to_owned(),
            started_marker: "Bot started".to_owned(),
        }
    }
}

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub const JOIN_HINT: &str = "You can join the bot on the server using !join now";

/// What the user typed into the configuration group.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub username: String,
    pub image_folder: String,
}

impl Settings {
    /// Trimmed username, `None` when blank.
    pub fn target_username(&self) -> Option<&str> {
        let name = self.username.trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}
