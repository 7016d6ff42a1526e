//! Staff account management (administrators only).

use eframe::egui::{self, ScrollArea, Ui};
use egui_phosphor::regular::{PENCIL, TRASH, USER_PLUS};

use super::app::{App, DeleteTarget, UserForm};
use super::components::{
    action_button, back_button, colors, danger_action_button, panel_header, primary_button_with_icon, styled_button,
};
use crate::models::user::{Role, UserStatus};

/// Show the users panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let mut go_back = false;

    if back_button(ui) {
        go_back = true;
    }

    panel_header(ui, "Users");

    if primary_button_with_icon(ui, USER_PLUS, "Add User").clicked() {
        app.user_form = UserForm {
            is_open: true,
            ..Default::default()
        };
    }

    ui.add_space(15.0);

    show_table(app, ui);

    if app.user_form.is_open {
        show_form_dialog(app, ui.ctx());
    }

    go_back
}

fn show_table(app: &mut App, ui: &mut Ui) {
    let users = match app.users.list_users() {
        Ok(users) => users.to_vec(),
        Err(e) => {
            ui.colored_label(colors::ERROR, e.to_string());
            return;
        }
    };

    ui.label(format!("{} users", users.len()));
    ui.add_space(10.0);

    let mut edit = None;
    let mut delete = None;

    ScrollArea::vertical().id_salt("users_scroll").show(ui, |ui| {
        ui.add_space(4.0);
        egui::Grid::new("users_grid")
            .num_columns(7)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Username");
                ui.strong("Name");
                ui.strong("Role");
                ui.strong("Email");
                ui.strong("Status");
                ui.strong("Last Login");
                ui.strong("Actions");
                ui.end_row();

                for user in &users {
                    let protected = app.users.is_primary_admin(&user.username);

                    ui.label(&user.username);
                    ui.label(&user.full_name);
                    ui.label(user.role.display_name());
                    ui.label(user.email.as_deref().unwrap_or("-"));
                    match user.status {
                        UserStatus::Active => ui.colored_label(colors::SUCCESS, user.status.display_name()),
                        UserStatus::Blocked => ui.colored_label(colors::ERROR, user.status.display_name()),
                    };
                    ui.label(user.last_login.map(|d| d.to_string()).unwrap_or("-".to_string()));

                    ui.horizontal(|ui| {
                        ui.add_space(8.0);
                        if action_button(ui, PENCIL, "Edit").clicked() {
                            edit = Some(UserForm::edit(user));
                        }
                        if !protected {
                            ui.add_space(4.0);
                            if danger_action_button(ui, TRASH, "Delete").clicked() {
                                delete = Some(DeleteTarget::User(user.username.clone()));
                            }
                        }
                    });

                    ui.end_row();
                }
            });
    });

    if let Some(form) = edit {
        app.user_form = form;
    }
    if let Some(target) = delete {
        app.delete_target = Some(target);
        app.show_delete_confirm = true;
    }
}

fn show_form_dialog(app: &mut App, ctx: &egui::Context) {
    let title = if app.user_form.is_editing {
        "Edit User"
    } else {
        "Add User"
    };
    let protected = app.user_form.is_editing && app.users.is_primary_admin(&app.user_form.username);

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .default_width(420.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            let form = &mut app.user_form;
            egui::Grid::new("user_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Username:");
                    if form.is_editing {
                        ui.label(form.username.as_str());
                    } else {
                        ui.add(egui::TextEdit::singleline(&mut form.username).desired_width(200.0));
                    }
                    ui.end_row();

                    ui.label("Password:");
                    ui.add(
                        egui::TextEdit::singleline(&mut form.password)
                            .password(true)
                            .desired_width(200.0)
                            .hint_text(if form.is_editing { "Leave blank to keep" } else { "" }),
                    );
                    ui.end_row();

                    ui.label("Full Name:");
                    ui.add(egui::TextEdit::singleline(&mut form.full_name).desired_width(250.0));
                    ui.end_row();

                    ui.label("Email:");
                    ui.add(egui::TextEdit::singleline(&mut form.email).desired_width(250.0));
                    ui.end_row();

                    ui.label("Role:");
                    ui.add_enabled_ui(!protected, |ui| {
                        egui::ComboBox::from_id_salt("user_form_role")
                            .width(160.0)
                            .selected_text(form.role.display_name())
                            .show_ui(ui, |ui| {
                                for role in Role::ALL {
                                    ui.selectable_value(&mut form.role, role, role.display_name());
                                }
                            });
                    });
                    ui.end_row();

                    if form.role == Role::Doctor {
                        ui.label("Specialization:");
                        ui.add(egui::TextEdit::singleline(&mut form.specialization).desired_width(200.0));
                        ui.end_row();
                    }

                    if form.is_editing {
                        ui.label("Status:");
                        ui.add_enabled_ui(!protected, |ui| {
                            ui.horizontal(|ui| {
                                ui.selectable_value(&mut form.status, UserStatus::Active, "Active");
                                ui.selectable_value(&mut form.status, UserStatus::Blocked, "Blocked");
                            });
                        });
                        ui.end_row();
                    }
                });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.user_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Save").clicked() {
                        app.save_user();
                    }
                });
            });
        });
}
