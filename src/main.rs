mod app;
mod bot;
mod config;
mod error;
mod events;
mod loader;
mod pool;
mod state;

use app::DcaudClientApp;
use config::ClientConfig;
use eframe::egui;
use pool::WorkerPool;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting DCAUD client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::default();
    let pool = WorkerPool::new(config.loader_workers)?;
    log::info!("image loader pool ready with {} workers", pool.size());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_title("DCAUD Client Example - v1.0.0"),
        ..Default::default()
    };

    eframe::run_native(
        "DCAUD Client",
        options,
        Box::new(move |cc| Box::new(DcaudClientApp::new(cc, config, pool))),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))
}
