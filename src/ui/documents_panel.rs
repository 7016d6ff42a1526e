//! Medical documents: create from templates, list and save as Word.

use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{FILE_DOC, FILE_PLUS};

use super::app::{App, DocumentForm};
use super::components::{action_button, back_button, panel_header, primary_button_with_icon, styled_button};
use crate::auth::Permission;
use crate::documents::{self, field_label};

const MULTILINE_FIELDS: [&str; 4] = ["treatment", "medications", "results", "norm_values"];

/// Show the documents panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let mut go_back = false;

    if back_button(ui) {
        go_back = true;
    }

    panel_header(ui, "Documents");

    let Some(user) = app.users.current_user().cloned() else {
        return go_back;
    };

    ui.label(RichText::new("New document").strong());
    ui.add_space(8.0);
    ui.horizontal_wrapped(|ui| {
        for template in documents::templates_for_role(user.role) {
            if styled_button(ui, &format!("{FILE_PLUS} {}", template.name)).clicked() {
                app.document_form = DocumentForm::open(template.id, Some(&user));
            }
            ui.add_space(6.0);
        }
    });

    ui.add_space(15.0);
    ui.separator();
    ui.add_space(10.0);

    show_list(app, ui, &user.username);

    if app.document_form.is_open {
        show_form_dialog(app, ui.ctx());
    }

    go_back
}

fn show_list(app: &mut App, ui: &mut Ui, username: &str) {
    let view_all = app.can(Permission::ViewAllDocuments);
    let visible: Vec<&documents::Document> = if view_all {
        app.documents.documents().iter().collect()
    } else {
        app.documents.documents_by(username)
    };

    ui.label(if view_all {
        format!("{} documents this session", visible.len())
    } else {
        format!("{} of your documents this session", visible.len())
    });
    ui.add_space(10.0);

    let mut export = None;

    ScrollArea::vertical().id_salt("documents_scroll").show(ui, |ui| {
        egui::Grid::new("documents_grid")
            .num_columns(5)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Document");
                ui.strong("Patient");
                ui.strong("Created");
                ui.strong("Author");
                ui.strong("Actions");
                ui.end_row();

                for document in &visible {
                    ui.label(&document.name);
                    ui.label(document.data.get("patient_name").map(String::as_str).unwrap_or("-"));
                    ui.label(document.created_at.format("%d.%m.%Y").to_string());
                    ui.label(document.created_by.as_deref().unwrap_or("-"));
                    ui.horizontal(|ui| {
                        ui.add_space(8.0);
                        if action_button(ui, FILE_DOC, "Save as Word").clicked() {
                            export = Some((*document).clone());
                        }
                    });
                    ui.end_row();
                }
            });
    });

    if let Some(document) = export {
        app.export_document(document);
    }
}

fn show_form_dialog(app: &mut App, ctx: &egui::Context) {
    let Some(template) = documents::template(&app.document_form.template_id) else {
        app.document_form = DocumentForm::default();
        return;
    };

    egui::Window::new(template.name)
        .collapsible(false)
        .resizable(false)
        .default_width(480.0)
        .max_height(560.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            ScrollArea::vertical().max_height(440.0).show(ui, |ui| {
                egui::Grid::new("document_form_grid")
                    .num_columns(2)
                    .spacing([20.0, 10.0])
                    .show(ui, |ui| {
                        for field in template.fields {
                            ui.label(format!("{}:", field_label(field)));
                            let value = app.document_form.values.entry(field.to_string()).or_default();
                            if MULTILINE_FIELDS.contains(field) {
                                ui.add(egui::TextEdit::multiline(value).desired_rows(3).desired_width(280.0));
                            } else {
                                ui.add(egui::TextEdit::singleline(value).desired_width(280.0));
                            }
                            ui.end_row();
                        }
                    });
            });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.document_form = DocumentForm::default();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Create").clicked() {
                        app.create_document();
                    }
                });
            });
        });
}
