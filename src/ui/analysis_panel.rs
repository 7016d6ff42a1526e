//! Analysis results: filtering, Word export and emailing to patients.

use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, ENVELOPE, EYE, FILE_DOC, FUNNEL};

use super::app::{AnalysisFilterForm, App};
use super::components::{
    action_button, back_button, colors, date_input, panel_header, primary_button_with_icon, styled_button,
    styled_button_with_icon,
};
use crate::auth::Permission;
use crate::models::analysis::{AnalysisStatus, ResultData, status_label};
use crate::reference::{EMAIL_UNKNOWN_RANGE, reference_range};

/// Show the analysis results panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let mut go_back = false;

    if back_button(ui) {
        go_back = true;
    }

    panel_header(ui, "Analysis Results");

    show_filters(app, ui);

    ui.add_space(10.0);

    ui.horizontal(|ui| {
        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.load_results();
        }

        if app.can(Permission::ExportData) {
            ui.add_space(10.0);

            if styled_button_with_icon(ui, FILE_DOC, "Export All to Word").clicked() {
                app.export_results();
            }
        }
    });

    ui.add_space(15.0);

    show_table(app, ui);

    if app.viewed_result.is_some() {
        show_details_window(app, ui.ctx());
    }
    if app.email_form.is_open {
        show_email_dialog(app, ui.ctx());
    }

    go_back
}

fn show_filters(app: &mut App, ui: &mut Ui) {
    ui.horizontal(|ui| {
        ui.label("Patient:");
        egui::ComboBox::from_id_salt("analysis_patient_filter")
            .width(180.0)
            .selected_text(
                app.analysis_filter
                    .patient_id
                    .and_then(|id| app.patients.iter().find(|p| p.id == id))
                    .map(|p| p.full_name.as_str())
                    .unwrap_or("All"),
            )
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut app.analysis_filter.patient_id, None, "All");
                for patient in &app.patients {
                    ui.selectable_value(&mut app.analysis_filter.patient_id, Some(patient.id), &patient.full_name);
                }
            });

        ui.add_space(10.0);

        ui.label("Type:");
        egui::ComboBox::from_id_salt("analysis_type_filter")
            .width(180.0)
            .selected_text(
                app.analysis_filter
                    .analysis_type_id
                    .and_then(|id| app.analysis_types.iter().find(|t| t.id == id))
                    .map(|t| t.name.as_str())
                    .unwrap_or("All"),
            )
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut app.analysis_filter.analysis_type_id, None, "All");
                for kind in &app.analysis_types {
                    ui.selectable_value(&mut app.analysis_filter.analysis_type_id, Some(kind.id), &kind.name);
                }
            });

        ui.add_space(10.0);

        ui.label("Status:");
        egui::ComboBox::from_id_salt("analysis_status_filter")
            .width(110.0)
            .selected_text(app.analysis_filter.status.map(|s| s.label()).unwrap_or("All"))
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut app.analysis_filter.status, None, "All");
                for status in AnalysisStatus::ALL {
                    ui.selectable_value(&mut app.analysis_filter.status, Some(status), status.label());
                }
            });
    });

    ui.add_space(8.0);

    ui.horizontal(|ui| {
        let filter = &mut app.analysis_filter;
        ui.label("From:");
        date_input(ui, &mut filter.from_input, &mut filter.from_date, true);
        ui.add_space(10.0);
        ui.label("To:");
        date_input(ui, &mut filter.to_input, &mut filter.to_date, true);

        ui.add_space(20.0);

        if primary_button_with_icon(ui, FUNNEL, "Apply").clicked() {
            app.load_results();
        }
        if styled_button(ui, "Clear").clicked() {
            app.analysis_filter = AnalysisFilterForm::default();
            app.load_results();
        }
    });
}

fn show_table(app: &mut App, ui: &mut Ui) {
    let can_send = app.can(Permission::SendResults);

    ui.label(format!("{} results", app.analysis_results.len()));
    ui.add_space(10.0);

    let mut view = None;
    let mut export = None;
    let mut email = None;

    ScrollArea::vertical().id_salt("analysis_scroll").show(ui, |ui| {
        ui.add_space(4.0);
        egui::Grid::new("analysis_grid")
            .num_columns(6)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Date");
                ui.strong("Patient");
                ui.strong("Analysis");
                ui.strong("Technician");
                ui.strong("Status");
                ui.strong("Actions");
                ui.end_row();

                for row in &app.analysis_results {
                    ui.label(row.result_date.format("%d.%m.%Y").to_string());
                    ui.label(&row.patient_name);
                    ui.label(&row.analysis_type);
                    ui.label(if row.lab_technician.is_empty() {
                        "-"
                    } else {
                        row.lab_technician.as_str()
                    });

                    let color = match AnalysisStatus::from_code(&row.status) {
                        Some(AnalysisStatus::Sent) | Some(AnalysisStatus::Completed) => colors::SUCCESS,
                        Some(AnalysisStatus::Pending) => colors::WARNING,
                        _ => colors::NEUTRAL,
                    };
                    ui.colored_label(color, status_label(&row.status));

                    ui.horizontal(|ui| {
                        ui.add_space(8.0);
                        if action_button(ui, EYE, "View").clicked() {
                            view = Some(row.id);
                        }
                        ui.add_space(4.0);
                        if action_button(ui, FILE_DOC, "Save as Word").clicked() {
                            export = Some(row.id);
                        }
                        if can_send {
                            ui.add_space(4.0);
                            if action_button(ui, ENVELOPE, "Email to patient").clicked() {
                                email = Some(row.id);
                            }
                        }
                    });

                    ui.end_row();
                }
            });
    });

    if let Some(id) = view {
        app.viewed_result = Some(id);
    }
    if let Some(id) = export {
        app.export_result(id);
    }
    if let Some(id) = email {
        app.open_email_dialog(id);
    }
}

fn show_details_window(app: &mut App, ctx: &egui::Context) {
    let Some(row) = app.viewed_result.and_then(|id| app.find_result(id)) else {
        app.viewed_result = None;
        return;
    };

    let mut open = true;
    egui::Window::new(format!("{} - {}", row.analysis_type, row.patient_name))
        .id(egui::Id::new("analysis_details"))
        .open(&mut open)
        .collapsible(false)
        .default_width(480.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(format!("Date: {}", row.result_date.format("%d.%m.%Y")));
            ui.label(format!("Status: {}", status_label(&row.status)));
            ui.add_space(10.0);

            match row.data() {
                ResultData::Empty => {
                    ui.label(RichText::new("No data").weak());
                }
                ResultData::Text(text) => {
                    ui.label(text);
                }
                data @ ResultData::Table(_) => {
                    egui::Grid::new("analysis_details_grid")
                        .num_columns(3)
                        .striped(true)
                        .spacing([20.0, 6.0])
                        .show(ui, |ui| {
                            ui.strong("Parameter");
                            ui.strong("Value");
                            ui.strong("Reference");
                            ui.end_row();

                            for (name, value) in data.ordered(row.parameters.as_deref()) {
                                ui.label(&name);
                                ui.label(value);
                                ui.label(reference_range(&name).unwrap_or(EMAIL_UNKNOWN_RANGE));
                                ui.end_row();
                            }
                        });
                }
            }
        });

    if !open {
        app.viewed_result = None;
    }
}

fn show_email_dialog(app: &mut App, ctx: &egui::Context) {
    egui::Window::new("Send Results")
        .collapsible(false)
        .resizable(false)
        .default_width(420.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            let form = &mut app.email_form;
            egui::Grid::new("email_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("To:");
                    ui.add(
                        egui::TextEdit::singleline(&mut form.recipient)
                            .desired_width(260.0)
                            .hint_text("patient@example.com"),
                    );
                    ui.end_row();

                    ui.label("Subject:");
                    ui.add(egui::TextEdit::singleline(&mut form.subject).desired_width(260.0));
                    ui.end_row();

                    ui.label("Attach:");
                    ui.checkbox(&mut form.attach_report, "Word report");
                    ui.end_row();
                });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.email_form.is_open = false;
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, ENVELOPE, "Send").clicked() {
                        app.send_email();
                    }
                });
            });
        });
}
