//! Sign-in screen shown while no user is logged in.

use eframe::egui::{self, CornerRadius, Key, Margin, RichText, Ui};
use egui_phosphor::regular::SIGN_IN;

use super::app::App;
use super::components::{colors, primary_button_with_icon};

/// Show the login form.
pub fn show(app: &mut App, ui: &mut Ui) {
    ui.vertical_centered(|ui| {
        ui.add_space((ui.available_height() * 0.2).max(20.0));

        ui.label(RichText::new("MedCenter Desk").size(32.0).strong());
        ui.add_space(5.0);
        ui.label(RichText::new("Clinic administration").size(14.0).weak());
        ui.add_space(30.0);

        egui::Frame::new()
            .fill(ui.style().visuals.extreme_bg_color)
            .inner_margin(Margin::same(20))
            .corner_radius(CornerRadius::same(8))
            .show(ui, |ui| {
                ui.set_width(320.0);

                egui::Grid::new("login_grid")
                    .num_columns(2)
                    .spacing([15.0, 10.0])
                    .show(ui, |ui| {
                        ui.label("Username:");
                        ui.add(egui::TextEdit::singleline(&mut app.login_form.username).desired_width(200.0));
                        ui.end_row();

                        ui.label("Password:");
                        let response = ui.add(
                            egui::TextEdit::singleline(&mut app.login_form.password)
                                .password(true)
                                .desired_width(200.0),
                        );
                        if response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
                            app.login();
                        }
                        ui.end_row();
                    });

                if let Some(error) = &app.login_form.error {
                    ui.add_space(8.0);
                    ui.colored_label(colors::ERROR, error);
                }

                ui.add_space(15.0);
                if primary_button_with_icon(ui, SIGN_IN, "Log In").clicked() {
                    app.login();
                }
            });
    });
}
