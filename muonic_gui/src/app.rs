use std::time::{Duration, Instant};

use eframe::egui::{Button, Color32, Key, KeyboardShortcut, Modifiers, ViewportCommand};

use libmuonic_gui::controller::Controller;
use libmuonic_gui::dialogs::Dialog;
use libmuonic_gui::menu::{ActionResponse, MenuAction, Shortcut, ShortcutKey, MENUS};

use super::dialogs::render_dialog;
use super::panels::{render_widget, PanelAction};

/// Upper bound on the time between two frames, so events keep flowing without input
const MAX_FRAME_INTERVAL: Duration = Duration::from_millis(100);

fn render_error_dialog(show: &mut bool, ctx: &eframe::egui::Context) {
    eframe::egui::Window::new("Error")
        .open(show)
        .show(ctx, |ui| {
            ui.label("There was an error! Check the log file muonic_gui.log for more information.")
        });
}

fn egui_shortcut(shortcut: Shortcut) -> KeyboardShortcut {
    let modifiers = if shortcut.ctrl {
        Modifiers::COMMAND
    } else {
        Modifiers::NONE
    };
    let key = match shortcut.key {
        ShortcutKey::O => Key::O,
        ShortcutKey::Q => Key::Q,
        ShortcutKey::F1 => Key::F1,
    };
    KeyboardShortcut::new(modifiers, key)
}

/// The UI app which inherits the eframe::App trait.
///
/// Drawing only; all state changes go through the controller.
#[derive(Debug)]
pub struct MuonicApp {
    controller: Controller,
    selected_tab: String,
    dialog: Option<Dialog>,
    status_tip: String,
    show_error_window: bool,
}

impl MuonicApp {
    /// Create the application
    pub fn new(cc: &eframe::CreationContext<'_>, controller: Controller) -> Self {
        let mut visuals = eframe::egui::Visuals::dark();
        visuals.override_text_color = Some(Color32::LIGHT_GRAY);
        cc.egui_ctx.set_visuals(visuals);
        let selected_tab = controller
            .registry()
            .tabs()
            .first()
            .map(|(name, _)| name.to_string())
            .unwrap_or_default();
        MuonicApp {
            controller,
            selected_tab,
            dialog: None,
            status_tip: String::new(),
            show_error_window: false,
        }
    }

    fn run_action(&mut self, action: MenuAction) {
        // a modal dialog is already open
        if self.dialog.is_some() {
            return;
        }
        match action.handler()(&mut self.controller) {
            ActionResponse::Done => (),
            ActionResponse::ShowDialog(dialog) => self.dialog = Some(dialog),
        }
    }

    fn handle_shortcuts(&mut self, ctx: &eframe::egui::Context) {
        let mut triggered = None;
        for entry in MENUS.iter().flat_map(|m| m.entries.iter()) {
            if let Some(shortcut) = entry.shortcut {
                if ctx.input_mut(|i| i.consume_shortcut(&egui_shortcut(shortcut))) {
                    triggered = Some(entry.action);
                }
            }
        }
        if let Some(action) = triggered {
            self.run_action(action);
        }
    }

    /// Turn a window close into the confirmation prompt
    fn handle_close_request(&mut self, ctx: &eframe::egui::Context) {
        if ctx.input(|i| i.viewport().close_requested()) && !self.controller.is_closed() {
            ctx.send_viewport_cmd(ViewportCommand::CancelClose);
            if !self.controller.is_close_pending() {
                self.dialog = None;
                if let ActionResponse::ShowDialog(dialog) = self.controller.request_close() {
                    self.dialog = Some(dialog);
                }
            }
        }
    }

    fn render_menu(&mut self, ui: &mut eframe::egui::Ui) {
        let mut triggered = None;
        eframe::egui::menu::bar(ui, |ui| {
            for menu in MENUS.iter() {
                ui.menu_button(menu.title, |ui| {
                    for entry in menu.entries {
                        let mut button = Button::new(entry.label);
                        if let Some(shortcut) = entry.shortcut {
                            button = button.shortcut_text(shortcut.to_string());
                        }
                        let response = ui.add(button);
                        if response.hovered() {
                            self.status_tip = entry.status_tip.to_string();
                        }
                        if response.clicked() {
                            triggered = Some(entry.action);
                            ui.close_menu();
                        }
                    }
                });
            }
        });
        if let Some(action) = triggered {
            self.run_action(action);
        }
    }

    fn render_tabs(&mut self, ui: &mut eframe::egui::Ui) {
        ui.horizontal(|ui| {
            for (name, label) in self.controller.registry().tabs() {
                if ui
                    .selectable_label(self.selected_tab == name, label)
                    .clicked()
                {
                    self.selected_tab = name.to_string();
                }
            }
        });
        ui.separator();

        let mut actions = Vec::new();
        if let Some(widget) = self.controller.registry_mut().get_mut(&self.selected_tab) {
            render_widget(ui, widget, &mut actions);
        }
        for action in actions {
            match action {
                PanelAction::SubmitDaqCommand => {
                    self.controller.submit_daq_command();
                }
                PanelAction::RequestGps => self.controller.request_gps(),
            }
        }
    }

    fn render_open_dialog(&mut self, ctx: &eframe::egui::Context) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        let Some(accepted) = render_dialog(ctx, dialog) else {
            return;
        };
        if let Some(dialog) = self.dialog.take() {
            let closing = dialog == Dialog::ConfirmClose && accepted;
            self.controller.close_dialog(dialog, accepted);
            if closing {
                ctx.send_viewport_cmd(ViewportCommand::Close);
            }
        }
    }
}

impl eframe::App for MuonicApp {
    fn update(&mut self, ctx: &eframe::egui::Context, _frame: &mut eframe::Frame) {
        self.controller.poll_events();
        self.controller.tick(Instant::now());
        if self.controller.take_worker_error().is_some() {
            self.show_error_window = true;
        }

        self.handle_close_request(ctx);
        self.handle_shortcuts(ctx);
        render_error_dialog(&mut self.show_error_window, ctx);

        eframe::egui::TopBottomPanel::top("menu").show(ctx, |ui| self.render_menu(ui));
        eframe::egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status_tip);
                ui.with_layout(
                    eframe::egui::Layout::right_to_left(eframe::egui::Align::Center),
                    |ui| {
                        ui.label(if self.controller.is_running() {
                            "acquisition running"
                        } else {
                            "acquisition stopped"
                        });
                    },
                );
            });
        });
        eframe::egui::CentralPanel::default().show(ctx, |ui| self.render_tabs(ui));
        self.render_open_dialog(ctx);

        let wait = self
            .controller
            .next_wakeup(Instant::now())
            .min(MAX_FRAME_INTERVAL);
        ctx.request_repaint_after(wait);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // closing without the prompt, e.g. through the OS
        self.controller.shutdown();
    }
}
