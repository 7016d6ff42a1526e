//! Patient management panel with search and CRUD.

use eframe::egui::{self, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, MAGNIFYING_GLASS, PENCIL, PLUS, TRASH};

use super::app::{App, DeleteTarget, PatientForm};
use super::components::{
    action_button, back_button, colors, danger_action_button, date_input, panel_header, primary_button_with_icon,
    styled_button, styled_button_with_icon,
};
use crate::auth::Permission;
use crate::models::patient::status;

const GENDERS: [&str; 2] = ["M", "F"];

/// Show the patients panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let mut go_back = false;

    if back_button(ui) {
        go_back = true;
    }

    panel_header(ui, "Patients");

    ui.horizontal(|ui| {
        if app.can(Permission::AddPatient) && primary_button_with_icon(ui, PLUS, "Add Patient").clicked() {
            app.patient_form = PatientForm {
                is_open: true,
                ..Default::default()
            };
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.load_patients();
        }

        ui.add_space(20.0);

        ui.label("Search:");
        let response = ui.add(
            egui::TextEdit::singleline(&mut app.patient_search)
                .desired_width(220.0)
                .hint_text("Name, phone or email..."),
        );
        let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        if submitted || styled_button_with_icon(ui, MAGNIFYING_GLASS, "Find").clicked() {
            app.load_patients();
        }

        if !app.patient_search.is_empty() && styled_button(ui, "Clear").clicked() {
            app.patient_search.clear();
            app.load_patients();
        }
    });

    ui.add_space(15.0);

    show_table(app, ui);

    if app.patient_form.is_open {
        show_form_dialog(app, ui.ctx());
    }

    go_back
}

fn show_table(app: &mut App, ui: &mut Ui) {
    let can_edit = app.can(Permission::EditPatient);
    let can_delete = app.can(Permission::DeletePatient);

    ui.label(format!("{} patients", app.patients.len()));
    ui.add_space(10.0);

    let mut edit = None;
    let mut delete = None;

    ScrollArea::vertical().id_salt("patients_scroll").show(ui, |ui| {
        ui.add_space(4.0);
        egui::Grid::new("patients_grid")
            .num_columns(8)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("ID");
                ui.strong("Name");
                ui.strong("Birth Date");
                ui.strong("Phone");
                ui.strong("Diagnosis");
                ui.strong("Admitted");
                ui.strong("Status");
                ui.strong("Actions");
                ui.end_row();

                for patient in &app.patients {
                    ui.label(patient.id.to_string());
                    ui.label(&patient.full_name);
                    ui.label(patient.birth_date.map(|d| d.to_string()).unwrap_or("-".to_string()));
                    ui.label(patient.phone.as_deref().unwrap_or("-"));
                    ui.label(&patient.diagnosis);
                    ui.label(patient.admitted_on.to_string());
                    if patient.status == status::DISCHARGED {
                        ui.colored_label(colors::NEUTRAL, &patient.status);
                    } else {
                        ui.colored_label(colors::SUCCESS, &patient.status);
                    }

                    ui.horizontal(|ui| {
                        ui.add_space(8.0);
                        if can_edit && action_button(ui, PENCIL, "Edit").clicked() {
                            edit = Some(PatientForm::edit(patient));
                        }
                        ui.add_space(4.0);
                        if can_delete && danger_action_button(ui, TRASH, "Delete").clicked() {
                            delete = Some(DeleteTarget::Patient(patient.id, patient.full_name.clone()));
                        }
                    });

                    ui.end_row();
                }
            });
    });

    if let Some(form) = edit {
        app.patient_form = form;
    }
    if let Some(target) = delete {
        app.delete_target = Some(target);
        app.show_delete_confirm = true;
    }
}

fn show_form_dialog(app: &mut App, ctx: &egui::Context) {
    let title = if app.patient_form.is_editing {
        "Edit Patient"
    } else {
        "Add Patient"
    };

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .default_width(450.0)
        .max_height(520.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            let form = &mut app.patient_form;
            ScrollArea::vertical().max_height(420.0).show(ui, |ui| {
                egui::Grid::new("patient_form_grid")
                    .num_columns(2)
                    .spacing([20.0, 10.0])
                    .show(ui, |ui| {
                        ui.label("Full Name:");
                        ui.add(egui::TextEdit::singleline(&mut form.full_name).desired_width(250.0));
                        ui.end_row();

                        ui.label("Birth Date:");
                        date_input(ui, &mut form.birth_date_input, &mut form.birth_date, true);
                        ui.end_row();

                        ui.label("Gender:");
                        egui::ComboBox::from_id_salt("patient_form_gender")
                            .width(120.0)
                            .selected_text(form.gender.as_deref().unwrap_or("Select..."))
                            .show_ui(ui, |ui| {
                                if ui.selectable_label(form.gender.is_none(), "None").clicked() {
                                    form.gender = None;
                                }
                                for gender in GENDERS {
                                    if ui
                                        .selectable_label(form.gender.as_deref() == Some(gender), gender)
                                        .clicked()
                                    {
                                        form.gender = Some(gender.to_string());
                                    }
                                }
                            });
                        ui.end_row();

                        ui.label("Phone:");
                        ui.add(egui::TextEdit::singleline(&mut form.phone).desired_width(200.0));
                        ui.end_row();

                        ui.label("Email:");
                        ui.add(egui::TextEdit::singleline(&mut form.email).desired_width(250.0));
                        ui.end_row();

                        ui.label("Address:");
                        ui.add(egui::TextEdit::singleline(&mut form.address).desired_width(250.0));
                        ui.end_row();

                        ui.label("Diagnosis:");
                        ui.add(egui::TextEdit::singleline(&mut form.diagnosis).desired_width(250.0));
                        ui.end_row();

                        ui.label("Admitted:");
                        if form.is_editing {
                            ui.label(form.admitted_on_input.as_str());
                        } else {
                            date_input(ui, &mut form.admitted_on_input, &mut form.admitted_on, false);
                        }
                        ui.end_row();

                        ui.label("Status:");
                        egui::ComboBox::from_id_salt("patient_form_status")
                            .width(150.0)
                            .selected_text(form.status.as_str())
                            .show_ui(ui, |ui| {
                                for value in status::ALL {
                                    ui.selectable_value(&mut form.status, value.to_string(), value);
                                }
                            });
                        ui.end_row();
                    });
            });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.patient_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Save").clicked() {
                        app.save_patient();
                    }
                });
            });
        });
}
