//! System statistics for a date range.

use eframe::egui::{self, RichText, Ui};
use egui_phosphor::regular::ARROWS_CLOCKWISE;

use super::app::App;
use super::components::{back_button, date_input, panel_header, primary_button_with_icon, stat_card};
use crate::db::stats::LabelCount;

/// Show the statistics panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let mut go_back = false;

    if back_button(ui) {
        go_back = true;
    }

    panel_header(ui, "System Statistics");

    ui.horizontal(|ui| {
        let range = &mut app.statistics_range;
        ui.label("From:");
        date_input(ui, &mut range.from_input, &mut range.from, false);
        ui.add_space(10.0);
        ui.label("To:");
        date_input(ui, &mut range.to_input, &mut range.to, false);

        ui.add_space(20.0);

        if primary_button_with_icon(ui, ARROWS_CLOCKWISE, "Update").clicked() {
            app.load_statistics();
        }
    });

    ui.add_space(20.0);

    let Some(stats) = &app.statistics else {
        ui.label(RichText::new("No statistics loaded").weak());
        return go_back;
    };

    ui.horizontal(|ui| {
        stat_card(ui, "Patients", &stats.total_patients.to_string(), "Registered in total");
        stat_card(ui, "New Patients", &stats.new_patients.to_string(), "Registered in period");
        stat_card(ui, "Analyses", &stats.total_analyses.to_string(), "Completed in period");
        stat_card(ui, "Appointments", &stats.total_appointments.to_string(), "Scheduled in period");
    });

    ui.add_space(20.0);

    ui.columns(3, |columns| {
        breakdown(&mut columns[0], "stats_users", "Users by role", &stats.users_by_role);
        breakdown(&mut columns[1], "stats_analyses", "Analyses by type", &stats.analyses_by_type);
        breakdown(
            &mut columns[2],
            "stats_appointments",
            "Appointments by status",
            &stats.appointments_by_status,
        );
    });

    go_back
}

fn breakdown(ui: &mut Ui, id: &str, title: &str, entries: &[LabelCount]) {
    ui.label(RichText::new(title).strong());
    ui.add_space(8.0);

    if entries.is_empty() {
        ui.label(RichText::new("No data").weak());
        return;
    }

    egui::Grid::new(id)
        .num_columns(2)
        .striped(true)
        .spacing([30.0, 6.0])
        .show(ui, |ui| {
            for entry in entries {
                ui.label(&entry.label);
                ui.label(entry.count.to_string());
                ui.end_row();
            }
        });
}
