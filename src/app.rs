use crossbeam_channel::Receiver;
use eframe::egui;

use crate::bot::ProcessBotController;
use crate::config::ClientConfig;
use crate::events::{EventSink, UiEvent};
use crate::pool::WorkerPool;
use crate::state::ClientState;

#[derive(PartialEq, Clone, Copy)]
enum Tab {
    Image,
    Log,
}

pub struct DcaudClientApp {
    state: ClientState<egui::TextureHandle>,
    rx: Receiver<UiEvent>,
    active_tab: Tab,
}

impl DcaudClientApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: ClientConfig, pool: WorkerPool) -> Self {
        let mut visuals = egui::Visuals::dark();
        visuals.window_rounding = egui::Rounding::same(12.0);
        visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
        visuals.widgets.active.rounding = egui::Rounding::same(8.0);
        visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
        visuals.selection.bg_fill = egui::Color32::from_rgb(52, 152, 219);
        cc.egui_ctx.set_visuals(visuals);

        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(10.0, 10.0);
        cc.egui_ctx.set_style(style);

        // Worker threads and bot readers wake the UI through this sink.
        let (sink, rx) = EventSink::channel(Some(cc.egui_ctx.clone()));
        let controller = ProcessBotController::new(sink.clone());

        Self {
            state: ClientState::new(config, Box::new(controller), pool, sink),
            rx,
            active_tab: Tab::Image,
        }
    }

    fn browse_folder(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_title("Select Image Folder")
            .pick_folder()
        else {
            return;
        };

        if let Err(e) = self.state.select_folder(&path) {
            log::warn!("{}", e);
        }
    }

    fn show_configuration(&mut self, ui: &mut egui::Ui) {
        let editable = !self.state.bot_running();

        egui::Frame::group(ui.style())
            .inner_margin(egui::Margin::same(15.0))
            .show(ui, |ui| {
                ui.label(egui::RichText::new("Configuration").strong());
                ui.add_space(5.0);

                egui::Grid::new("config_grid").spacing([10.0, 10.0]).show(ui, |ui| {
                    ui.label("Target Username:");
                    ui.add_enabled(
                        editable,
                        egui::TextEdit::singleline(&mut self.state.settings.username)
                            .hint_text("Discord username to monitor")
                            .desired_width(400.0),
                    );
                    ui.end_row();

                    ui.label("Image Folder:");
                    ui.horizontal(|ui| {
                        let mut folder = self.state.settings.image_folder.clone();
                        ui.add_enabled(
                            editable,
                            egui::TextEdit::singleline(&mut folder)
                                .hint_text("Select image folder")
                                .interactive(false)
                                .desired_width(320.0),
                        );
                        if ui.add_enabled(editable, egui::Button::new("Browse")).clicked() {
                            self.browse_folder();
                        }
                    });
                    ui.end_row();
                });
            });
    }

    fn show_controls(&mut self, ui: &mut egui::Ui) {
        let running = self.state.bot_running();

        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new(self.state.status_text()).size(16.0).strong());
            ui.label(
                egui::RichText::new(format!("{:?}", self.state.run_state()))
                    .small()
                    .color(egui::Color32::GRAY),
            );
        });

        ui.horizontal(|ui| {
            let size = egui::vec2(150.0, 30.0);
            if ui.add_enabled(!running, egui::Button::new("Start Bot").min_size(size)).clicked() {
                self.state.request_start();
            }
            if ui.add_enabled(running, egui::Button::new("Stop Bot").min_size(size)).clicked() {
                self.state.stop();
            }
            if ui.add(egui::Button::new("Clear Log").min_size(size)).clicked() {
                self.state.clear_log();
            }
        });

        let speaking = self.state.speaking();
        let mut text = egui::RichText::new(&speaking.text);
        if speaking.highlighted {
            text = text.color(egui::Color32::GREEN).strong();
        }
        ui.label(text);
    }

    fn show_tabs(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.style_mut().spacing.item_spacing.x = 0.0;

            let tab_btn = |ui: &mut egui::Ui, text: &str, tab: Tab, active: Tab| {
                let is_active = tab == active;
                let btn = egui::Button::new(egui::RichText::new(text).strong().color(
                    if is_active { egui::Color32::WHITE } else { egui::Color32::GRAY },
                ))
                .fill(if is_active { egui::Color32::from_rgb(52, 152, 219) } else { egui::Color32::TRANSPARENT })
                .min_size(egui::vec2(150.0, 30.0));

                if ui.add(btn).clicked() {
                    Some(tab)
                } else {
                    None
                }
            };

            if let Some(t) = tab_btn(ui, "Image Display", Tab::Image, self.active_tab) {
                self.active_tab = t;
            }
            if let Some(t) = tab_btn(ui, &format!("Log ({})", self.state.log_lines().len()), Tab::Log, self.active_tab) {
                self.active_tab = t;
            }
        });

        ui.add_space(10.0);

        match self.active_tab {
            Tab::Image => {
                egui::Frame::none()
                    .stroke(egui::Stroke::new(1.0, egui::Color32::GRAY))
                    .show(ui, |ui| {
                        ui.set_min_size(egui::vec2(400.0, 400.0));
                        ui.centered_and_justified(|ui| {
                            if let Some(tex) = self.state.displayed_image() {
                                ui.image((tex.id(), tex.size_vec2()));
                            } else {
                                ui.label(
                                    egui::RichText::new(format!(
                                        "{} images loaded",
                                        self.state.gallery().len()
                                    ))
                                    .color(egui::Color32::GRAY),
                                );
                            }
                        });
                    });
            }
            Tab::Log => {
                let scroll = self.state.take_scroll_request();
                egui::Frame::group(ui.style()).show(ui, |ui| {
                    ui.label(egui::RichText::new("Bot Log").strong());
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            for line in self.state.log_lines() {
                                ui.monospace(line);
                            }
                            if scroll {
                                ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                            }
                        });
                });
            }
        }
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.state.dialog() else {
            return;
        };

        egui::Window::new(dialog.title())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(dialog.message());
                ui.add_space(10.0);
                ui.horizontal(|ui| {
                    if dialog.is_question() {
                        if ui.button("Yes").clicked() {
                            self.state.confirm_start(true);
                        }
                        if ui.button("No").clicked() {
                            self.state.confirm_start(false);
                        }
                    } else if ui.button("OK").clicked() {
                        self.state.dismiss_dialog();
                    }
                });
            });
    }
}

impl eframe::App for DcaudClientApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.rx.try_recv() {
            self.state.apply(event, |image| {
                ctx.load_texture("gallery-image", image, egui::TextureOptions::LINEAR)
            });
        }

        let modal_open = self.state.dialog().is_some();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!modal_open, |ui| {
                self.show_configuration(ui);
                ui.add_space(10.0);
                self.show_controls(ui);
                ui.separator();
                self.show_tabs(ui);
            });
        });

        self.show_dialog(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.shutdown();
    }
}
