//! Patient reports panel with preview and Excel/CSV export.

use chrono::Local;
use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, FILE_CSV, FILE_XLS};

use super::app::App;
use super::components::{back_button, panel_header, primary_button_with_icon, styled_button_with_icon};
use crate::models::patient::PatientRow;
use crate::report::{self, ReportFormat, ReportKind};

/// Show the reports panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let mut go_back = false;

    if back_button(ui) {
        go_back = true;
    }

    panel_header(ui, "Patient Reports");

    // Report type toggle
    ui.horizontal(|ui| {
        ui.label("Report Type:");
        ui.add_space(10.0);

        for kind in ReportKind::ALL {
            if ui.selectable_label(app.report_form.kind == kind, kind.title()).clicked() {
                app.report_form.kind = kind;
            }
        }
    });

    ui.add_space(10.0);

    ui.horizontal(|ui| {
        ui.label("Format:");
        ui.add_space(10.0);

        ui.selectable_value(&mut app.report_form.format, ReportFormat::Excel, "Excel (.xlsx)");
        ui.selectable_value(&mut app.report_form.format, ReportFormat::Csv, "CSV");
    });

    ui.add_space(15.0);

    ui.horizontal(|ui| {
        let icon = match app.report_form.format {
            ReportFormat::Excel => FILE_XLS,
            ReportFormat::Csv => FILE_CSV,
        };
        if primary_button_with_icon(ui, icon, "Generate Report").clicked() {
            app.generate_report();
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Reload Patients").clicked() {
            app.load_patients();
        }
    });

    ui.add_space(15.0);
    ui.separator();
    ui.add_space(10.0);

    show_preview(app, ui);

    go_back
}

fn show_preview(app: &App, ui: &mut Ui) {
    ui.label(RichText::new("Preview").strong());
    ui.add_space(8.0);

    if app.patients.is_empty() {
        ui.label(RichText::new("No patients loaded").weak());
        return;
    }

    let today = Local::now().date_naive();
    let rows: Vec<PatientRow> = app
        .patients
        .iter()
        .map(|p| PatientRow::from_model(p, today))
        .collect();

    ScrollArea::vertical().id_salt("report_preview_scroll").show(ui, |ui| {
        match app.report_form.kind {
            ReportKind::PatientList => {
                egui::Grid::new("report_preview_list")
                    .num_columns(6)
                    .striped(true)
                    .spacing([12.0, 6.0])
                    .show(ui, |ui| {
                        for header in ["ID", "Name", "Age", "Diagnosis", "Admitted", "Status"] {
                            ui.strong(header);
                        }
                        ui.end_row();

                        for row in &rows {
                            ui.label(&row.id);
                            ui.label(&row.name);
                            ui.label(&row.age);
                            ui.label(&row.diagnosis);
                            ui.label(&row.date);
                            ui.label(&row.status);
                            ui.end_row();
                        }
                    });
            }
            ReportKind::ByDiagnosis => {
                count_grid(ui, "report_preview_diag", "Diagnosis", report::diagnosis_counts(&rows));
            }
            ReportKind::ByAgeGroup => {
                let counts = report::age_group_counts(&rows)
                    .into_iter()
                    .map(|(bucket, count)| (bucket.label().to_string(), count))
                    .collect();
                count_grid(ui, "report_preview_age", "Age Group", counts);
            }
        }
    });
}

fn count_grid(ui: &mut Ui, id: &str, label: &str, counts: Vec<(String, usize)>) {
    egui::Grid::new(id)
        .num_columns(2)
        .striped(true)
        .spacing([40.0, 6.0])
        .show(ui, |ui| {
            ui.strong(label);
            ui.strong("Patients");
            ui.end_row();

            for (name, count) in counts {
                ui.label(name);
                ui.label(count.to_string());
                ui.end_row();
            }
        });
}
