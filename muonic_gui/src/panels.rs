//! Drawing of the widget tabs
use eframe::egui::{Color32, Grid, RichText, ScrollArea, TextEdit, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints};

use libmuonic_gui::widgets::rate::RATE_LABELS;
use libmuonic_gui::widgets::{
    DaqWidget, DecayWidget, GpsWidget, Histogram, PulseWidget, RateWidget, StatusWidget,
    VelocityWidget, Widget,
};

/// Things a tab asks the controller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    SubmitDaqCommand,
    RequestGps,
}

fn heading(ui: &mut Ui, text: &str) {
    ui.label(RichText::new(text).color(Color32::LIGHT_BLUE).size(18.0));
}

/// Checkbox switching a widget on and off
fn active_toggle(ui: &mut Ui, widget: &mut dyn Widget) {
    let mut active = widget.is_active();
    if ui.checkbox(&mut active, "Show").changed() {
        widget.set_active(active);
    }
}

fn histogram_plot(ui: &mut Ui, id: &str, histogram: &Histogram, color: Color32) {
    let width = histogram.bin_width();
    let bars: Vec<Bar> = histogram
        .bars()
        .into_iter()
        .map(|(center, count)| Bar::new(center, count as f64).width(width))
        .collect();
    ui.label(&histogram.title);
    Plot::new(id)
        .height(200.0)
        .x_axis_label(histogram.x_label.clone())
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(color));
        });
}

/// Draw a registered widget. Unknown widget types get a placeholder
pub fn render_widget(ui: &mut Ui, widget: &mut dyn Widget, actions: &mut Vec<PanelAction>) {
    if let Some(rate) = widget.downcast_mut::<RateWidget>() {
        render_rate(ui, rate);
    } else if let Some(pulse) = widget.downcast_mut::<PulseWidget>() {
        render_pulse(ui, pulse);
    } else if let Some(decay) = widget.downcast_mut::<DecayWidget>() {
        active_toggle(ui, decay);
        ui.label(&decay.summary);
        histogram_plot(ui, "decay", &decay.plot_canvas, Color32::LIGHT_RED);
    } else if let Some(velocity) = widget.downcast_mut::<VelocityWidget>() {
        active_toggle(ui, velocity);
        ui.label(&velocity.summary);
        histogram_plot(ui, "velocity", &velocity.plot_canvas, Color32::LIGHT_GREEN);
    } else if let Some(status) = widget.downcast_ref::<StatusWidget>() {
        render_status(ui, status);
    } else if let Some(daq) = widget.downcast_mut::<DaqWidget>() {
        render_daq(ui, daq, actions);
    } else if let Some(gps) = widget.downcast_mut::<GpsWidget>() {
        render_gps(ui, gps, actions);
    } else {
        ui.label("Nothing to show");
    }
}

fn render_rate(ui: &mut Ui, rate: &mut RateWidget) {
    ui.horizontal(|ui| {
        Grid::new("RateGrid").striped(true).show(ui, |ui| {
            ui.label("");
            ui.label("rate [1/s]");
            ui.label("counts");
            ui.end_row();
            for (idx, label) in RATE_LABELS.iter().enumerate() {
                ui.label(*label);
                ui.monospace(&rate.rate_fields[idx]);
                ui.monospace(&rate.scalar_fields[idx]);
                ui.end_row();
            }
        });
        ui.separator();
        Grid::new("RateInfoGrid").show(ui, |ui| {
            for field in rate.info_fields.iter() {
                ui.label(field.label);
                ui.monospace(&field.value);
                ui.end_row();
            }
            ui.label("Recording");
            ui.label(if rate.is_recording() { "yes" } else { "no" });
            ui.end_row();
        });
    });

    ui.separator();
    Plot::new("rates")
        .legend(Legend::default())
        .x_axis_label("time [s]")
        .y_axis_label("rate [1/s]")
        .show(ui, |plot_ui| {
            for (slot, label) in RATE_LABELS.iter().enumerate() {
                let points: PlotPoints = rate
                    .scalars_monitor
                    .samples()
                    .map(|s| [s.time, s.rates[slot]])
                    .collect();
                plot_ui.line(Line::new(points).name(*label));
            }
        });
}

fn render_pulse(ui: &mut Ui, pulse: &mut PulseWidget) {
    active_toggle(ui, pulse);
    ui.label(format!("{} pulses", pulse.total_pulses()));
    Grid::new("PulseGrid").num_columns(2).show(ui, |ui| {
        for (ch, canvas) in pulse.pulse_width_canvases.iter().enumerate() {
            ui.vertical(|ui| {
                if let Some(mean) = pulse.mean_widths[ch] {
                    ui.label(format!("mean {mean:.1} ns"));
                }
                ui.set_width(380.0);
                histogram_plot(ui, &format!("pulse{ch}"), canvas, Color32::LIGHT_BLUE);
            });
            if ch % 2 == 1 {
                ui.end_row();
            }
        }
    });
}

fn render_status(ui: &mut Ui, status: &StatusWidget) {
    heading(ui, "Channels");
    for line in status.channel_lines() {
        ui.monospace(line);
    }
    ui.separator();
    Grid::new("StatusGrid").show(ui, |ui| {
        ui.label("Coincidence");
        ui.label(status.coincidence_text());
        ui.end_row();
        ui.label("Veto");
        ui.label(status.veto_text());
        ui.end_row();
        ui.label("Gate width");
        ui.label(format!("{} ns", status.advanced.gate_width));
        ui.end_row();
        ui.label("Time window");
        ui.label(format!("{:.2} s", status.advanced.time_window));
        ui.end_row();
        ui.label("Write DAQ status");
        ui.label(status.advanced.write_daq_status.to_string());
        ui.end_row();
    });
}

fn render_daq(ui: &mut Ui, daq: &mut DaqWidget, actions: &mut Vec<PanelAction>) {
    ui.horizontal(|ui| {
        ui.label("Command:");
        let response = ui.add(TextEdit::singleline(&mut daq.command_input).desired_width(300.0));
        let entered =
            response.lost_focus() && ui.input(|i| i.key_pressed(eframe::egui::Key::Enter));
        if ui.button("Send").clicked() || entered {
            actions.push(PanelAction::SubmitDaqCommand);
        }
        if ui.button("Clear").clicked() {
            daq.clear();
        }
    });
    ui.separator();
    ScrollArea::vertical()
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            ui.monospace(daq.log());
        });
}

fn render_gps(ui: &mut Ui, gps: &mut GpsWidget, actions: &mut Vec<PanelAction>) {
    if ui.button("Read GPS").clicked() {
        actions.push(PanelAction::RequestGps);
    }
    if let Some(last) = gps.last_query {
        ui.label(format!("Last query: {last}"));
    }
    ui.separator();
    for line in gps.report() {
        ui.monospace(line);
    }
}
