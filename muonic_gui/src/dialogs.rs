//! Drawing of the settings dialogs. The dialog models live in the library
use eframe::egui::{Align2, Context, DragValue, Grid, ScrollArea, Ui, Window};

use libmuonic_gui::dialogs::{
    about_text, AdvancedDialog, ConfigDialog, Dialog, ThresholdDialog, HELP_TEXT, MAX_GATE_WIDTH,
    MAX_THRESHOLD,
};
use libmuonic_gui::settings::{ChannelConfig, MAX_TIME_WINDOW, N_CHANNELS, N_VETO_CHANNELS};

/// Show the dialog. Returns Some(accepted) once the operator closed it
pub fn render_dialog(ctx: &Context, dialog: &mut Dialog) -> Option<bool> {
    let mut result = None;
    Window::new(dialog.title())
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            match dialog {
                Dialog::Thresholds(d) => render_thresholds(ui, d),
                Dialog::Config(d) => render_config(ui, d),
                Dialog::Advanced(d) => render_advanced(ui, d),
                Dialog::Help => {
                    ScrollArea::vertical().max_height(400.0).show(ui, |ui| {
                        ui.monospace(HELP_TEXT);
                    });
                }
                Dialog::About => {
                    ui.label(about_text());
                }
                Dialog::ConfirmClose => {
                    ui.label("Do you really want to exit?");
                }
            }
            ui.separator();
            result = buttons(ui, dialog);
        });
    result
}

fn buttons(ui: &mut Ui, dialog: &Dialog) -> Option<bool> {
    let (accept, reject) = match dialog {
        Dialog::Help | Dialog::About => ("Close", None),
        Dialog::ConfirmClose => ("Yes", Some("No")),
        _ => ("Ok", Some("Cancel")),
    };
    let mut result = None;
    ui.horizontal(|ui| {
        if ui.button(accept).clicked() {
            result = Some(true);
        }
        if let Some(reject) = reject {
            if ui.button(reject).clicked() {
                result = Some(false);
            }
        }
    });
    result
}

fn render_thresholds(ui: &mut Ui, dialog: &mut ThresholdDialog) {
    Grid::new("ThresholdGrid").show(ui, |ui| {
        for (ch, threshold) in dialog.thresholds.thresholds.iter_mut().enumerate() {
            ui.label(format!("Channel {ch}"));
            ui.add(
                DragValue::new(threshold)
                    .speed(1)
                    .range(0..=MAX_THRESHOLD)
                    .suffix(" mV"),
            );
            ui.end_row();
        }
    });
}

fn render_config(ui: &mut Ui, dialog: &mut ConfigDialog) {
    let config = &mut dialog.config;
    ui.horizontal(|ui| {
        ui.vertical(|ui| {
            ui.strong("Channels");
            for ch in 0..N_CHANNELS {
                ui.checkbox(&mut config.channels[ch], format!("Channel {ch}"));
            }
        });
        ui.separator();
        ui.vertical(|ui| {
            ui.strong("Coincidence");
            for (level, name) in ChannelConfig::COINCIDENCE_NAMES.iter().enumerate() {
                ui.checkbox(&mut config.coincidences[level], *name);
            }
        });
        ui.separator();
        ui.vertical(|ui| {
            ui.strong("Veto");
            ui.checkbox(&mut config.veto, "Enable veto");
            ui.add_enabled_ui(config.veto, |ui| {
                for ch in 0..N_VETO_CHANNELS {
                    ui.checkbox(&mut config.veto_channels[ch], format!("Channel {ch}"));
                }
            });
        });
    });
}

fn render_advanced(ui: &mut Ui, dialog: &mut AdvancedDialog) {
    let settings = &mut dialog.settings;
    Grid::new("AdvancedGrid").show(ui, |ui| {
        ui.label("Gate width");
        ui.add(
            DragValue::new(&mut settings.gate_width)
                .speed(10)
                .range(0..=MAX_GATE_WIDTH)
                .suffix(" ns"),
        );
        ui.end_row();
        // out-of-range values are replaced on apply, so the field is not clamped
        ui.label("Time window");
        ui.add(
            DragValue::new(&mut settings.time_window)
                .speed(0.1)
                .max_decimals(2)
                .suffix(" s"),
        );
        ui.end_row();
        ui.label("");
        ui.label(format!("between 0.01 s and {MAX_TIME_WINDOW} s"));
        ui.end_row();
        ui.checkbox(&mut settings.write_daq_status, "Write DAQ status");
        ui.end_row();
    });
}
