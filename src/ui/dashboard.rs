//! Dashboard panel with stats, navigation cards, quick actions, and activity log.

use eframe::egui::{self, Color32, CornerRadius, Margin, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{CHART_BAR, CHART_PIE, FILE_TEXT, FLASK, USERS, USER_LIST};

use super::app::{App, LogLevel, Panel};
use super::components::{dashboard_card, stat_card};
use crate::auth::Permission;
use crate::models::analysis::AnalysisStatus;
use crate::models::patient::status;

/// Show the dashboard panel.
///
/// Returns `Some(panel)` if navigation is requested.
pub fn show(app: &mut App, ui: &mut Ui) -> Option<Panel> {
    let mut next_panel = None;

    ui.vertical_centered(|ui| {
        ui.add_space(30.0);

        // Header
        ui.label(RichText::new("MedCenter Desk").size(32.0).strong());
        ui.add_space(5.0);
        if let Some(user) = app.users.current_user() {
            ui.label(
                RichText::new(format!("Welcome, {} ({})", user.full_name, user.role.display_name()))
                    .size(14.0)
                    .weak(),
            );
        }

        ui.add_space(30.0);

        // Stat cards row
        ui.horizontal(|ui| {
            let available = ui.available_width();
            let start_offset = ((available - 510.0) / 2.0).max(0.0);
            ui.add_space(start_offset);

            let in_treatment = app
                .patients
                .iter()
                .filter(|p| p.status == status::IN_TREATMENT)
                .count();
            let pending = app
                .analysis_results
                .iter()
                .filter(|r| r.status == AnalysisStatus::Pending.code())
                .count();

            stat_card(ui, "Patients", &app.patients.len().to_string(), "Registered patients");
            stat_card(ui, "In Treatment", &in_treatment.to_string(), "Currently admitted");
            stat_card(ui, "Pending Analyses", &pending.to_string(), "Awaiting results");
        });

        ui.add_space(30.0);

        // Navigation cards, only those the role may open
        let cards: Vec<(Panel, &str, &str, &str)> = [
            (Panel::Patients, "Patients", "Patient records", USER_LIST),
            (Panel::Analyses, "Analyses", "Results and mailing", FLASK),
            (Panel::Reports, "Reports", "Excel and CSV reports", CHART_BAR),
            (Panel::Documents, "Documents", "Reports and certificates", FILE_TEXT),
            (Panel::Users, "Users", "Staff accounts", USERS),
            (Panel::Statistics, "Statistics", "System activity", CHART_PIE),
        ]
        .into_iter()
        .filter(|(panel, ..)| panel.required_permission().is_none_or(|p| app.can(p)))
        .collect();

        let available = ui.available_width();
        let num_cards = cards.len().max(1) as f32;
        let spacing = 30.0;
        let total_spacing = spacing * (num_cards - 1.0);
        let card_width = ((available - total_spacing) / num_cards).clamp(150.0, 250.0);
        let card_height = card_width * 0.75;
        let card_size = egui::vec2(card_width, card_height);
        let total_width = card_width * num_cards + total_spacing;
        let start_offset = ((available - total_width) / 2.0).max(0.0);

        ui.horizontal(|ui| {
            ui.add_space(start_offset);

            for (i, (panel, title, description, icon)) in cards.into_iter().enumerate() {
                if i > 0 {
                    ui.add_space(spacing);
                }
                if dashboard_card(ui, title, description, icon, card_size).clicked() {
                    next_panel = Some(panel);
                }
            }
        });

        ui.add_space(30.0);
    });

    // Two-column layout: Quick Actions | Recent Activity
    let available_width = ui.available_width();
    let column_width = (available_width - 40.0) / 2.0;

    ui.horizontal(|ui| {
        ui.add_space(10.0);

        // Left column - Quick Actions
        ui.vertical(|ui| {
            ui.set_width(column_width);

            egui::Frame::new()
                .fill(ui.style().visuals.extreme_bg_color)
                .inner_margin(Margin::same(15))
                .corner_radius(CornerRadius::same(8))
                .show(ui, |ui| {
                    ui.set_min_width(column_width - 30.0);

                    ui.label(RichText::new("Quick Actions").strong());
                    ui.add_space(10.0);

                    if app.can(Permission::AddPatient) && ui.button("Add Patient").clicked() {
                        app.patient_form.reset();
                        app.patient_form.is_open = true;
                        next_panel = Some(Panel::Patients);
                    }

                    if app.can(Permission::CreateReport) && ui.button("Patient List Report").clicked() {
                        next_panel = Some(Panel::Reports);
                    }

                    if app.can(Permission::SendResults) && ui.button("Send Analysis Results").clicked() {
                        next_panel = Some(Panel::Analyses);
                    }

                    if ui.button("New Document").clicked() {
                        next_panel = Some(Panel::Documents);
                    }
                });
        });

        ui.add_space(20.0);

        // Right column - Recent Activity
        ui.vertical(|ui| {
            ui.set_width(column_width);

            egui::Frame::new()
                .fill(ui.style().visuals.extreme_bg_color)
                .inner_margin(Margin::same(15))
                .corner_radius(CornerRadius::same(8))
                .show(ui, |ui| {
                    ui.set_min_width(column_width - 30.0);

                    ui.label(RichText::new("Recent Activity").strong());
                    ui.add_space(10.0);

                    ScrollArea::vertical().max_height(150.0).show(ui, |ui| {
                        if app.log_messages.is_empty() {
                            ui.label(RichText::new("No recent activity").weak());
                        } else {
                            for entry in app.log_messages.iter().rev().take(10) {
                                let color = match entry.level {
                                    LogLevel::Info => Color32::GRAY,
                                    LogLevel::Success => Color32::from_rgb(100, 200, 100),
                                    LogLevel::Warning => Color32::from_rgb(230, 180, 50),
                                    LogLevel::Error => Color32::from_rgb(230, 100, 100),
                                };

                                ui.horizontal(|ui| {
                                    ui.label(
                                        RichText::new(entry.timestamp.format("%H:%M:%S").to_string())
                                            .small()
                                            .color(Color32::DARK_GRAY),
                                    );
                                    ui.label(RichText::new(&entry.message).color(color));
                                });
                            }
                        }
                    });
                });
        });
    });

    next_panel
}
