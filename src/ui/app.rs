//! Main application state, async message handling and dialogs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate};
use eframe::egui::{self, Align, Layout, RichText};
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;

use crate::auth::{Permission, UserManager};
use crate::config::AppConfig;
use crate::db;
use crate::db::stats::SystemStatistics;
use crate::documents::{self, Document, DocumentManager};
use crate::email::EmailSender;
use crate::entities::{analysis_types, patients};
use crate::export;
use crate::models::analysis::{AnalysisFilter, AnalysisResultRow, AnalysisStatus};
use crate::models::patient::{CreatePatient, PatientRow, UpdatePatient, status};
use crate::models::user::{NewUser, Role, User, UserStatus, UserUpdate};
use crate::report::{self, ReportFormat, ReportKind, ReportMeta};

use super::components::colors;
use super::{
    analysis_panel, dashboard, documents_panel, login, patients_panel, reports_panel, statistics_panel, users_panel,
};

/// Current panel being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Dashboard,
    Patients,
    Analyses,
    Reports,
    Documents,
    Users,
    Statistics,
}

impl Panel {
    /// Get the display name for the panel.
    pub fn name(&self) -> &'static str {
        match self {
            Panel::Dashboard => "Dashboard",
            Panel::Patients => "Patients",
            Panel::Analyses => "Analysis Results",
            Panel::Reports => "Reports",
            Panel::Documents => "Documents",
            Panel::Users => "Users",
            Panel::Statistics => "Statistics",
        }
    }

    /// Capability needed to open the panel.
    pub fn required_permission(&self) -> Option<Permission> {
        match self {
            Panel::Dashboard | Panel::Documents => None,
            Panel::Patients => Some(Permission::ViewPatients),
            Panel::Analyses => Some(Permission::ViewAnalyses),
            Panel::Reports => Some(Permission::CreateReport),
            Panel::Users => Some(Permission::ManageUsers),
            Panel::Statistics => Some(Permission::ViewStatistics),
        }
    }
}

/// Messages from async tasks to UI.
pub enum UiMessage {
    // Data loading
    PatientsLoaded(Vec<patients::Model>),
    ResultsLoaded(Vec<AnalysisResultRow>),
    TypesLoaded(Vec<analysis_types::Model>),
    StatisticsLoaded(SystemStatistics),
    LoadError(String),

    // CRUD operations
    PatientSaved(patients::Model),
    PatientDeleted(i32),
    UserSaved(User),
    UserDeleted(String),
    ResultUpdated(AnalysisResultRow),
    OperationFailed(String),

    // Email
    EmailSent { recipient: String, result_id: i32, ok: bool },
}

/// Log level for UI messages.
#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Log entry for display in the UI.
#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub level: LogLevel,
}

/// Target for delete confirmation dialog.
#[derive(Clone)]
pub enum DeleteTarget {
    Patient(i32, String),
    User(String),
}

/// Login screen input.
#[derive(Default, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub error: Option<String>,
}

/// Form state for patient CRUD.
#[derive(Clone)]
pub struct PatientForm {
    pub id: Option<i32>,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub birth_date_input: String,
    pub gender: Option<String>,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub diagnosis: String,
    pub status: String,
    pub admitted_on: Option<NaiveDate>,
    pub admitted_on_input: String,
    pub is_open: bool,
    pub is_editing: bool,
}

impl Default for PatientForm {
    fn default() -> Self {
        let today = Local::now().date_naive();
        Self {
            id: None,
            full_name: String::new(),
            birth_date: None,
            birth_date_input: String::new(),
            gender: None,
            phone: String::new(),
            email: String::new(),
            address: String::new(),
            diagnosis: String::new(),
            status: status::IN_TREATMENT.to_string(),
            admitted_on: Some(today),
            admitted_on_input: today.format("%Y-%m-%d").to_string(),
            is_open: false,
            is_editing: false,
        }
    }
}

impl PatientForm {
    /// Reset the form to default values.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Create a form pre-filled for editing an existing patient.
    pub fn edit(patient: &patients::Model) -> Self {
        Self {
            id: Some(patient.id),
            full_name: patient.full_name.clone(),
            birth_date: patient.birth_date,
            birth_date_input: patient
                .birth_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            gender: patient.gender.clone(),
            phone: patient.phone.clone().unwrap_or_default(),
            email: patient.email.clone().unwrap_or_default(),
            address: patient.address.clone().unwrap_or_default(),
            diagnosis: patient.diagnosis.clone(),
            status: patient.status.clone(),
            admitted_on: Some(patient.admitted_on),
            admitted_on_input: patient.admitted_on.format("%Y-%m-%d").to_string(),
            is_open: true,
            is_editing: true,
        }
    }
}

/// Filter inputs for the analysis results view.
#[derive(Default, Clone)]
pub struct AnalysisFilterForm {
    pub patient_id: Option<i32>,
    pub analysis_type_id: Option<i32>,
    pub from_date: Option<NaiveDate>,
    pub from_input: String,
    pub to_date: Option<NaiveDate>,
    pub to_input: String,
    pub status: Option<AnalysisStatus>,
}

impl AnalysisFilterForm {
    pub fn to_filter(&self) -> AnalysisFilter {
        AnalysisFilter {
            patient_id: self.patient_id,
            analysis_type_id: self.analysis_type_id,
            from_date: self.from_date,
            to_date: self.to_date,
            status: self.status,
        }
    }
}

/// Email dialog input.
#[derive(Default, Clone)]
pub struct EmailForm {
    pub result_id: Option<i32>,
    pub recipient: String,
    pub subject: String,
    pub attach_report: bool,
    pub is_open: bool,
}

/// Report options.
#[derive(Clone)]
pub struct ReportForm {
    pub kind: ReportKind,
    pub format: ReportFormat,
}

impl Default for ReportForm {
    fn default() -> Self {
        Self {
            kind: ReportKind::PatientList,
            format: ReportFormat::Excel,
        }
    }
}

/// New document input.
#[derive(Default, Clone)]
pub struct DocumentForm {
    pub template_id: String,
    pub values: BTreeMap<String, String>,
    pub is_open: bool,
}

impl DocumentForm {
    /// Open the form for a template, pre-filling what is known.
    pub fn open(template_id: &str, user: Option<&User>) -> Self {
        let today = Local::now().date_naive().format("%d.%m.%Y").to_string();
        let values = documents::template(template_id)
            .map(|t| {
                t.fields
                    .iter()
                    .map(|field| {
                        let value = match *field {
                            "date" => today.clone(),
                            "doctor_name" | "lab_technician" => {
                                user.map(|u| u.full_name.clone()).unwrap_or_default()
                            }
                            _ => String::new(),
                        };
                        (field.to_string(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            template_id: template_id.to_string(),
            values,
            is_open: true,
        }
    }
}

/// Form state for user CRUD.
#[derive(Clone)]
pub struct UserForm {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub specialization: String,
    pub status: UserStatus,
    pub is_open: bool,
    pub is_editing: bool,
}

impl Default for UserForm {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            full_name: String::new(),
            email: String::new(),
            role: Role::Doctor,
            specialization: String::new(),
            status: UserStatus::Active,
            is_open: false,
            is_editing: false,
        }
    }
}

impl UserForm {
    /// Reset the form to default values.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Create a form pre-filled for editing an existing user.
    pub fn edit(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            password: String::new(),
            full_name: user.full_name.clone(),
            email: user.email.clone().unwrap_or_default(),
            role: user.role,
            specialization: user.specialization.clone().unwrap_or_default(),
            status: user.status,
            is_open: true,
            is_editing: true,
        }
    }
}

/// Date range for the statistics view.
#[derive(Clone)]
pub struct StatisticsRange {
    pub from: Option<NaiveDate>,
    pub from_input: String,
    pub to: Option<NaiveDate>,
    pub to_input: String,
}

impl Default for StatisticsRange {
    fn default() -> Self {
        let today = Local::now().date_naive();
        let from = today - chrono::Duration::days(30);
        Self {
            from: Some(from),
            from_input: from.format("%Y-%m-%d").to_string(),
            to: Some(today),
            to_input: today.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Main application state.
pub struct App {
    // Runtime and database
    pub rt: tokio::runtime::Runtime,
    pub pool: DatabaseConnection,

    // Message channel for async communication
    pub tx: mpsc::UnboundedSender<UiMessage>,
    pub rx: mpsc::UnboundedReceiver<UiMessage>,

    // Session
    pub users: UserManager,
    pub documents: DocumentManager,
    pub login_form: LoginForm,

    // Navigation
    pub current_panel: Panel,

    // Cached data
    pub patients: Vec<patients::Model>,
    pub analysis_results: Vec<AnalysisResultRow>,
    pub analysis_types: Vec<analysis_types::Model>,
    pub statistics: Option<SystemStatistics>,

    // Loading states
    pub is_loading: bool,
    pub loading_message: String,

    // Forms
    pub patient_form: PatientForm,
    pub analysis_filter: AnalysisFilterForm,
    pub email_form: EmailForm,
    pub viewed_result: Option<i32>,
    pub report_form: ReportForm,
    pub document_form: DocumentForm,
    pub user_form: UserForm,
    pub statistics_range: StatisticsRange,

    // Search/filter state
    pub patient_search: String,

    // Log messages
    pub log_messages: Vec<LogEntry>,

    // Configuration
    pub config: AppConfig,

    // Dialogs
    pub show_delete_confirm: bool,
    pub delete_target: Option<DeleteTarget>,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
}

impl App {
    pub fn new(pool: DatabaseConnection, config: AppConfig, rt: tokio::runtime::Runtime, users: Vec<User>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let primary_admin = config.security.primary_admin.clone();

        Self {
            rt,
            pool,
            tx,
            rx,
            users: UserManager::new(users, primary_admin),
            documents: DocumentManager::new(),
            login_form: LoginForm::default(),
            current_panel: Panel::default(),
            patients: Vec::new(),
            analysis_results: Vec::new(),
            analysis_types: Vec::new(),
            statistics: None,
            is_loading: false,
            loading_message: String::new(),
            patient_form: PatientForm::default(),
            analysis_filter: AnalysisFilterForm::default(),
            email_form: EmailForm::default(),
            viewed_result: None,
            report_form: ReportForm::default(),
            document_form: DocumentForm::default(),
            user_form: UserForm::default(),
            statistics_range: StatisticsRange::default(),
            patient_search: String::new(),
            log_messages: Vec::new(),
            config,
            show_delete_confirm: false,
            delete_target: None,
            error_message: None,
            success_message: None,
        }
    }

    /// Log a message to the UI log.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log_messages.push(LogEntry {
            timestamp: Local::now(),
            message: message.into(),
            level,
        });

        // Keep only last 100 messages
        if self.log_messages.len() > 100 {
            self.log_messages.remove(0);
        }
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_success(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn log_warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Show an error in the modal dialog and the activity log.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.log_error(message.clone());
        self.error_message = Some(message);
    }

    /// Whether the signed-in user has `permission`.
    pub fn can(&self, permission: Permission) -> bool {
        self.users.has_permission(permission)
    }

    // ---- Session ----

    /// Attempt to sign in with the login form.
    pub fn login(&mut self) {
        let username = self.login_form.username.trim().to_string();
        let password = std::mem::take(&mut self.login_form.password);

        if !self.users.login(&username, &password) {
            self.login_form.error = Some("Invalid username or password".to_string());
            return;
        }

        self.login_form = LoginForm::default();
        self.current_panel = Panel::Dashboard;
        self.log_success(format!("Signed in as {username}"));

        let pool = self.pool.clone();
        let tx = self.tx.clone();
        let today = Local::now().date_naive();
        self.rt.spawn(async move {
            if let Err(e) = db::user::record_login(&pool, &username, today).await {
                let _ = tx.send(UiMessage::OperationFailed(e.to_string()));
            }
        });

        if self.can(Permission::ViewPatients) {
            self.load_patients();
        }
    }

    /// Sign out and drop cached data.
    pub fn logout(&mut self) {
        self.users.logout();
        self.current_panel = Panel::Dashboard;
        self.patients.clear();
        self.analysis_results.clear();
        self.statistics = None;
        self.viewed_result = None;
        self.patient_form.reset();
        self.user_form.reset();
        self.email_form = EmailForm::default();
        self.document_form = DocumentForm::default();
    }

    /// Switch panels, refusing those the role may not open.
    pub fn navigate(&mut self, panel: Panel) {
        if let Some(permission) = panel.required_permission()
            && !self.can(permission)
        {
            self.fail(format!("You do not have access to {}", panel.name()));
            return;
        }

        self.current_panel = panel;
        match panel {
            Panel::Patients | Panel::Reports => self.load_patients(),
            Panel::Analyses => {
                self.load_analysis_types();
                self.load_results();
                if self.patients.is_empty() && self.can(Permission::ViewPatients) {
                    self.load_patients();
                }
            }
            Panel::Statistics => self.load_statistics(),
            Panel::Dashboard | Panel::Documents | Panel::Users => {}
        }
    }

    // ---- Patients ----

    /// Load patients matching the search box.
    pub fn load_patients(&mut self) {
        let pool = self.pool.clone();
        let tx = self.tx.clone();
        let query = self.patient_search.clone();
        self.is_loading = true;
        self.loading_message = "Loading patients...".to_string();

        self.rt.spawn(async move {
            match db::patient::search(&pool, &query).await {
                Ok(list) => {
                    let _ = tx.send(UiMessage::PatientsLoaded(list));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::LoadError(e.to_string()));
                }
            }
        });
    }

    /// Validate the patient form and create or update the record.
    pub fn save_patient(&mut self) {
        let form = self.patient_form.clone();
        let permission = if form.is_editing {
            Permission::EditPatient
        } else {
            Permission::AddPatient
        };
        if let Err(e) = self.users.require(permission) {
            self.fail(e.to_string());
            return;
        }

        if form.full_name.trim().is_empty() {
            self.fail("Full name is required");
            return;
        }
        let Some(admitted_on) = form.admitted_on else {
            self.fail("Admission date is required");
            return;
        };
        if !form.birth_date_input.trim().is_empty() && form.birth_date.is_none() {
            self.fail("Invalid birth date");
            return;
        }

        let optional = |value: &str| Some(value.trim().to_string()).filter(|v| !v.is_empty());
        let pool = self.pool.clone();
        let tx = self.tx.clone();

        if let (true, Some(id)) = (form.is_editing, form.id) {
            let data = UpdatePatient {
                full_name: Some(form.full_name.trim().to_string()),
                birth_date: Some(form.birth_date),
                gender: Some(form.gender.clone()),
                phone: Some(optional(&form.phone)),
                email: Some(optional(&form.email)),
                address: Some(optional(&form.address)),
                diagnosis: Some(form.diagnosis.trim().to_string()),
                status: Some(form.status.clone()),
            };
            self.rt.spawn(async move {
                match db::patient::update(&pool, id, data).await {
                    Ok(Some(patient)) => {
                        let _ = tx.send(UiMessage::PatientSaved(patient));
                    }
                    Ok(None) => {
                        let _ = tx.send(UiMessage::OperationFailed("Patient not found".to_string()));
                    }
                    Err(e) => {
                        let _ = tx.send(UiMessage::OperationFailed(e.to_string()));
                    }
                }
            });
        } else {
            let data = CreatePatient {
                full_name: form.full_name.trim().to_string(),
                birth_date: form.birth_date,
                gender: form.gender.clone(),
                phone: optional(&form.phone),
                email: optional(&form.email),
                address: optional(&form.address),
                diagnosis: form.diagnosis.trim().to_string(),
                status: form.status.clone(),
                admitted_on,
            };
            self.rt.spawn(async move {
                match db::patient::create(&pool, data).await {
                    Ok(patient) => {
                        let _ = tx.send(UiMessage::PatientSaved(patient));
                    }
                    Err(e) => {
                        let _ = tx.send(UiMessage::OperationFailed(e.to_string()));
                    }
                }
            });
        }
    }

    /// Delete a patient.
    pub fn delete_patient(&mut self, id: i32) {
        if let Err(e) = self.users.require(Permission::DeletePatient) {
            self.fail(e.to_string());
            return;
        }

        let pool = self.pool.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            match db::patient::delete(&pool, id).await {
                Ok(true) => {
                    let _ = tx.send(UiMessage::PatientDeleted(id));
                }
                Ok(false) => {
                    let _ = tx.send(UiMessage::OperationFailed("Patient not found".to_string()));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::OperationFailed(e.to_string()));
                }
            }
        });
    }

    // ---- Analysis results ----

    pub fn load_analysis_types(&mut self) {
        let pool = self.pool.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            match db::analysis::list_types(&pool).await {
                Ok(types) => {
                    let _ = tx.send(UiMessage::TypesLoaded(types));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::LoadError(e.to_string()));
                }
            }
        });
    }

    /// Load results matching the filter form.
    pub fn load_results(&mut self) {
        let pool = self.pool.clone();
        let tx = self.tx.clone();
        let filter = self.analysis_filter.to_filter();
        self.is_loading = true;
        self.loading_message = "Loading analysis results...".to_string();

        self.rt.spawn(async move {
            match db::analysis::list_results(&pool, &filter).await {
                Ok(rows) => {
                    let _ = tx.send(UiMessage::ResultsLoaded(rows));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::LoadError(e.to_string()));
                }
            }
        });
    }

    pub fn find_result(&self, id: i32) -> Option<AnalysisResultRow> {
        self.analysis_results.iter().find(|r| r.id == id).cloned()
    }

    /// Save one result as a Word document chosen through a dialog.
    pub fn export_result(&mut self, id: i32) {
        let Some(row) = self.find_result(id) else {
            self.fail("Analysis result not found");
            return;
        };

        let default_name = export::default_result_filename(&row);
        let Some(path) = export::show_save_dialog(&default_name, "Word Documents", &["docx"]) else {
            return;
        };
        let path = with_extension(path, "docx");

        match export::export_result_to_docx(&row, &path) {
            Ok(()) => {
                self.success_message = Some(format!("Saved to {}", path.display()));
                self.log_success(format!("Exported analysis result #{id}"));
            }
            Err(e) => self.fail(format!("Export failed: {e}")),
        }
    }

    /// Save all listed results as one Word document.
    pub fn export_results(&mut self) {
        if let Err(e) = self.users.require(Permission::ExportData) {
            self.fail(e.to_string());
            return;
        }
        if self.analysis_results.is_empty() {
            self.fail("No analysis results to export");
            return;
        }

        let default_name = export::generate_export_filename("Analysis_report", "docx");
        let Some(path) = export::show_save_dialog(&default_name, "Word Documents", &["docx"]) else {
            return;
        };
        let path = with_extension(path, "docx");

        match export::export_results_to_docx(&self.analysis_results, &path) {
            Ok(()) => {
                self.success_message = Some(format!("Saved to {}", path.display()));
                self.log_success(format!("Exported {} analysis results", self.analysis_results.len()));
            }
            Err(e) => self.fail(format!("Export failed: {e}")),
        }
    }

    /// Open the email dialog for a result.
    pub fn open_email_dialog(&mut self, id: i32) {
        let Some(row) = self.find_result(id) else {
            self.fail("Analysis result not found");
            return;
        };

        self.email_form = EmailForm {
            result_id: Some(id),
            recipient: row.patient_email.clone().unwrap_or_default(),
            subject: format!("Analysis results: {}", row.analysis_type),
            attach_report: true,
            is_open: true,
        };
    }

    /// Send the result in the email dialog on a blocking worker.
    pub fn send_email(&mut self) {
        if let Err(e) = self.users.require(Permission::SendResults) {
            self.fail(e.to_string());
            return;
        }

        let form = self.email_form.clone();
        let Some(row) = form.result_id.and_then(|id| self.find_result(id)) else {
            self.fail("Analysis result not found");
            return;
        };
        let recipient = form.recipient.trim().to_string();
        if recipient.is_empty() {
            self.fail("Recipient email is required");
            return;
        }

        let sender = EmailSender::from_config(&self.config.smtp);
        if !sender.has_credentials() {
            self.fail("SMTP credentials are not configured (set MAIL_USERNAME and MAIL_PASSWORD)");
            return;
        }

        let mut attachments = Vec::new();
        let mut attachment_dir = None;
        if form.attach_report {
            match export::export_result_to_temp(&row) {
                Ok((dir, path)) => {
                    attachments.push(path);
                    attachment_dir = Some(dir);
                }
                Err(e) => {
                    self.fail(format!("Could not prepare attachment: {e}"));
                    return;
                }
            }
        }

        self.email_form.is_open = false;
        self.is_loading = true;
        self.loading_message = format!("Sending email to {recipient}...");

        let tx = self.tx.clone();
        self.rt.spawn_blocking(move || {
            let ok = sender.send_analysis_results(
                &recipient,
                &form.subject,
                &row.patient_name,
                &row.analysis_type,
                &row.data(),
                &attachments,
            );
            if let Some(dir) = attachment_dir
                && let Err(e) = dir.close()
            {
                tracing::warn!("Could not remove email attachment: {}", e);
            }
            let _ = tx.send(UiMessage::EmailSent {
                recipient,
                result_id: row.id,
                ok,
            });
        });
    }

    /// Mark a result as sent and reload its row.
    pub fn mark_sent(&mut self, id: i32) {
        let pool = self.pool.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            let updated = match db::analysis::set_status(&pool, id, AnalysisStatus::Sent).await {
                Ok(true) => db::analysis::get_result(&pool, id).await,
                Ok(false) => Ok(None),
                Err(e) => Err(e),
            };
            match updated {
                Ok(Some(row)) => {
                    let _ = tx.send(UiMessage::ResultUpdated(row));
                }
                Ok(None) => {
                    let _ = tx.send(UiMessage::OperationFailed("Analysis result not found".to_string()));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::OperationFailed(e.to_string()));
                }
            }
        });
    }

    // ---- Reports ----

    /// Build the selected report from loaded patients and save it.
    pub fn generate_report(&mut self) {
        if let Err(e) = self.users.require(Permission::CreateReport) {
            self.fail(e.to_string());
            return;
        }
        let Some(user) = self.users.current_user().cloned() else {
            return;
        };
        if self.patients.is_empty() {
            self.fail("No data to build the report");
            return;
        }

        let today = Local::now().date_naive();
        let rows: Vec<PatientRow> = self
            .patients
            .iter()
            .map(|p| PatientRow::from_model(p, today))
            .collect();
        let meta = ReportMeta {
            generated_by: user.full_name.clone(),
            role: user.role.display_name().to_string(),
            date: today.format("%d.%m.%Y").to_string(),
        };
        let ReportForm { kind, format } = self.report_form.clone();

        let default_name = report::report_filename(kind, format, today);
        let (filter_name, ext) = match format {
            ReportFormat::Excel => ("Excel Files", "xlsx"),
            ReportFormat::Csv => ("CSV Files", "csv"),
        };
        let start_dir = PathBuf::from(&self.config.export.output_dir);
        let Some(path) = rfd::FileDialog::new()
            .set_directory(&start_dir)
            .set_file_name(&default_name)
            .add_filter(filter_name, &[ext])
            .save_file()
        else {
            return;
        };
        let path = with_extension(path, ext);

        let result = report::generate_report(&rows, kind, &meta, format)
            .and_then(|bytes| std::fs::write(&path, bytes).map_err(Into::into));
        match result {
            Ok(()) => {
                self.success_message = Some(format!("Report saved to {}", path.display()));
                self.log_success(format!("{} report generated", kind.title()));
            }
            Err(e) => self.fail(format!("Report failed: {e}")),
        }
    }

    // ---- Documents ----

    /// Create a document from the document form.
    pub fn create_document(&mut self) {
        let Some(user) = self.users.current_user().cloned() else {
            return;
        };
        let form = std::mem::take(&mut self.document_form);

        match self.documents.create_for_user(&user, &form.template_id, form.values) {
            Ok(document) => {
                let name = document.name.clone();
                let missing = document.missing_fields();
                self.success_message = Some(format!("Document '{name}' created"));
                self.log_success(format!("Created document '{name}'"));
                if !missing.is_empty() {
                    self.log_warning(format!("'{name}' has empty fields: {}", missing.join(", ")));
                }
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Save a created document as Word.
    pub fn export_document(&mut self, document: Document) {
        let default_name = format!(
            "{}_{}.docx",
            document.kind,
            document.created_at.format("%Y%m%d")
        );
        let Some(path) = export::show_save_dialog(&default_name, "Word Documents", &["docx"]) else {
            return;
        };
        let path = with_extension(path, "docx");

        match export::export_document_to_docx(&document, &path) {
            Ok(()) => {
                self.success_message = Some(format!("Saved to {}", path.display()));
                self.log_success(format!("Exported document '{}'", document.name));
            }
            Err(e) => self.fail(format!("Export failed: {e}")),
        }
    }

    // ---- Users ----

    /// Validate the user form and write it to the store. The roster picks
    /// up the stored row when `UserSaved` arrives.
    pub fn save_user(&mut self) {
        let form = self.user_form.clone();
        let optional = |value: &str| Some(value.trim().to_string()).filter(|v| !v.is_empty());

        let prepared = if form.is_editing {
            let update = UserUpdate {
                password: optional(&form.password),
                full_name: Some(form.full_name.clone()),
                email: Some(optional(&form.email)),
                role: Some(form.role),
                specialization: Some(optional(&form.specialization)),
                status: Some(form.status),
            };
            self.users.prepare_edit(&form.username, update)
        } else {
            let new = NewUser {
                username: form.username.clone(),
                password: form.password.clone(),
                full_name: form.full_name.clone(),
                email: optional(&form.email),
                role: form.role,
                specialization: optional(&form.specialization),
            };
            self.users.prepare_add(new)
        };

        let user = match prepared {
            Ok(user) => user,
            Err(e) => {
                self.fail(e.to_string());
                return;
            }
        };

        let pool = self.pool.clone();
        let tx = self.tx.clone();
        let is_new = !form.is_editing;

        self.rt.spawn(async move {
            let result = if is_new {
                db::user::create(&pool, &user).await
            } else {
                db::user::update(&pool, &user).await
            };
            match result {
                Ok(stored) => {
                    let _ = tx.send(UiMessage::UserSaved(stored));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::OperationFailed(format!("User '{}' was not saved: {e}", user.username)));
                }
            }
        });
    }

    /// Delete a user from the store, then from the roster.
    pub fn delete_user(&mut self, username: &str) {
        if let Err(e) = self.users.check_delete(username) {
            self.fail(e.to_string());
            return;
        }

        let pool = self.pool.clone();
        let tx = self.tx.clone();
        let username = username.to_string();

        self.rt.spawn(async move {
            match db::user::delete(&pool, &username).await {
                Ok(_) => {
                    let _ = tx.send(UiMessage::UserDeleted(username));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::OperationFailed(format!("User '{username}' was not deleted: {e}")));
                }
            }
        });
    }

    // ---- Statistics ----

    pub fn load_statistics(&mut self) {
        let (Some(from), Some(to)) = (self.statistics_range.from, self.statistics_range.to) else {
            self.fail("Enter a valid date range");
            return;
        };

        let pool = self.pool.clone();
        let tx = self.tx.clone();
        self.is_loading = true;
        self.loading_message = "Collecting statistics...".to_string();

        self.rt.spawn(async move {
            match db::stats::collect(&pool, from, to).await {
                Ok(stats) => {
                    let _ = tx.send(UiMessage::StatisticsLoaded(stats));
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::LoadError(e.to_string()));
                }
            }
        });
    }

    /// Poll async operation results.
    fn poll_async_results(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.handle_message(msg);
        }
    }

    /// Apply one async result to the UI state.
    fn handle_message(&mut self, msg: UiMessage) {
        match msg {
            UiMessage::PatientsLoaded(list) => {
                self.patients = list;
                self.is_loading = false;
            }
            UiMessage::ResultsLoaded(rows) => {
                self.analysis_results = rows;
                self.is_loading = false;
            }
            UiMessage::TypesLoaded(types) => {
                self.analysis_types = types;
            }
            UiMessage::StatisticsLoaded(stats) => {
                self.statistics = Some(stats);
                self.is_loading = false;
            }
            UiMessage::LoadError(e) => {
                self.is_loading = false;
                self.fail(e);
            }
            UiMessage::PatientSaved(patient) => {
                self.success_message = Some(format!("Patient '{}' saved", patient.full_name));
                self.log_success(format!("Saved patient {}", patient.full_name));
                self.patient_form.reset();
                self.load_patients();
            }
            UiMessage::PatientDeleted(id) => {
                self.patients.retain(|p| p.id != id);
                self.success_message = Some("Patient deleted".to_string());
                self.log_success("Patient deleted");
            }
            UiMessage::UserSaved(user) => {
                let username = user.username.clone();
                self.users.store_user(user);
                if self.user_form.username == username {
                    self.user_form.reset();
                }
                self.success_message = Some(format!("User '{username}' saved"));
                self.log_success(format!("Saved user {username}"));
            }
            UiMessage::UserDeleted(username) => {
                self.users.remove_user(&username);
                self.success_message = Some(format!("User '{username}' deleted"));
                self.log_success(format!("Deleted user {username}"));
            }
            UiMessage::ResultUpdated(row) => {
                let id = row.id;
                if let Some(cached) = self.analysis_results.iter_mut().find(|r| r.id == id) {
                    *cached = row;
                }
                self.log_info(format!("Analysis result #{id} marked as {}", AnalysisStatus::Sent.label()));
            }
            UiMessage::OperationFailed(e) => {
                self.fail(e);
            }
            UiMessage::EmailSent {
                recipient,
                result_id,
                ok,
            } => {
                self.is_loading = false;
                if ok {
                    self.success_message = Some(format!("Results sent to {recipient}"));
                    self.log_success(format!("Emailed result #{result_id} to {recipient}"));
                    self.mark_sent(result_id);
                } else {
                    self.fail(format!("Failed to send email to {recipient}. See the log for details."));
                }
            }
        }
    }

    /// Render menu bar.
    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Log Out").clicked() {
                        self.logout();
                        ui.close();
                    }
                    if ui.button("Exit").clicked() {
                        ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });
                ui.menu_button("Go", |ui| {
                    for panel in [
                        Panel::Dashboard,
                        Panel::Patients,
                        Panel::Analyses,
                        Panel::Reports,
                        Panel::Documents,
                        Panel::Users,
                        Panel::Statistics,
                    ] {
                        let allowed = panel.required_permission().is_none_or(|p| self.can(p));
                        if ui.add_enabled(allowed, egui::Button::new(panel.name())).clicked() {
                            self.navigate(panel);
                            ui.close();
                        }
                    }
                });
            });
        });
    }

    /// Render status bar (display only, no interaction).
    fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar")
            .min_height(28.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if let Some(user) = self.users.current_user() {
                        ui.colored_label(
                            colors::SUCCESS,
                            format!("{} ({})", user.full_name, user.role.display_name()),
                        );
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if self.is_loading {
                            ui.label(RichText::new(&self.loading_message).weak());
                            ui.spinner();
                        }
                    });
                });
            });
    }

    /// Render modal dialogs (error, success, delete confirmation).
    fn show_dialogs(&mut self, ctx: &egui::Context) {
        // Error dialog
        if let Some(ref error) = self.error_message.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::ERROR, error);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
        }

        // Success dialog
        if let Some(ref msg) = self.success_message.clone() {
            egui::Window::new("Success")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::SUCCESS, msg);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.success_message = None;
                    }
                });
        }

        // Delete confirmation dialog
        if self.show_delete_confirm
            && let Some(ref target) = self.delete_target.clone()
        {
            let (title, message) = match target {
                DeleteTarget::Patient(_, name) => ("Delete Patient", format!("Delete patient '{name}'?")),
                DeleteTarget::User(username) => ("Delete User", format!("Delete user '{username}'?")),
            };

            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        if ui.button("Cancel").clicked() {
                            self.show_delete_confirm = false;
                            self.delete_target = None;
                        }
                        if ui.button("Delete").clicked() {
                            self.confirm_delete();
                            self.show_delete_confirm = false;
                            self.delete_target = None;
                        }
                    });
                });
        }
    }

    /// Execute the confirmed delete operation.
    fn confirm_delete(&mut self) {
        if let Some(target) = self.delete_target.take() {
            match target {
                DeleteTarget::Patient(id, name) => {
                    self.log_info(format!("Deleting patient: {name}"));
                    self.delete_patient(id);
                }
                DeleteTarget::User(username) => {
                    self.log_info(format!("Deleting user: {username}"));
                    self.delete_user(&username);
                }
            }
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Poll async results
        self.poll_async_results();

        if self.is_loading {
            ctx.request_repaint();
        }

        if self.users.current_user().is_none() {
            self.show_dialogs(ctx);
            egui::CentralPanel::default().show(ctx, |ui| login::show(self, ui));
            return;
        }

        self.show_menu_bar(ctx);
        self.show_status_bar(ctx);
        self.show_dialogs(ctx);

        // Main content
        egui::CentralPanel::default().show(ctx, |ui| match self.current_panel {
            Panel::Dashboard => {
                if let Some(next) = dashboard::show(self, ui) {
                    self.navigate(next);
                }
            }
            Panel::Patients => {
                if patients_panel::show(self, ui) {
                    self.current_panel = Panel::Dashboard;
                }
            }
            Panel::Analyses => {
                if analysis_panel::show(self, ui) {
                    self.current_panel = Panel::Dashboard;
                }
            }
            Panel::Reports => {
                if reports_panel::show(self, ui) {
                    self.current_panel = Panel::Dashboard;
                }
            }
            Panel::Documents => {
                if documents_panel::show(self, ui) {
                    self.current_panel = Panel::Dashboard;
                }
            }
            Panel::Users => {
                if users_panel::show(self, ui) {
                    self.current_panel = Panel::Dashboard;
                }
            }
            Panel::Statistics => {
                if statistics_panel::show(self, ui) {
                    self.current_panel = Panel::Dashboard;
                }
            }
        });
    }
}

/// Append `ext` when the chosen path has no extension.
fn with_extension(path: PathBuf, ext: &str) -> PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_permissions() {
        assert_eq!(Panel::Dashboard.required_permission(), None);
        assert_eq!(Panel::Documents.required_permission(), None);
        assert_eq!(Panel::Users.required_permission(), Some(Permission::ManageUsers));
        assert_eq!(Panel::Reports.required_permission(), Some(Permission::CreateReport));
    }

    #[test]
    fn test_document_form_prefills_known_fields() {
        let user = User {
            id: Some(2),
            username: "doctor1".to_string(),
            password_hash: String::new(),
            full_name: "Ivan Petrov".to_string(),
            email: None,
            role: Role::Doctor,
            specialization: None,
            status: UserStatus::Active,
            last_login: None,
        };

        let form = DocumentForm::open("prescription", Some(&user));
        assert!(form.is_open);
        assert_eq!(form.values.len(), 6);
        assert_eq!(form.values["doctor_name"], "Ivan Petrov");
        assert_eq!(form.values["patient_name"], "");
        assert!(!form.values["date"].is_empty());

        assert!(DocumentForm::open("unknown", None).values.is_empty());
    }

    /// App over a seeded store, signed in as the admin.
    fn signed_in_app() -> (tempfile::TempDir, App) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (dir, pool) = rt.block_on(db::test_support::open());
        let users = rt.block_on(async {
            db::user::seed_defaults_if_empty(&pool).await.unwrap();
            db::user::list_all(&pool).await.unwrap()
        });
        let mut app = App::new(pool, AppConfig::default(), rt, users);
        assert!(app.users.login("admin", "admin123"));
        (dir, app)
    }

    /// Wait for the next async result and apply it.
    fn settle(app: &mut App) {
        let msg = app.rt.block_on(app.rx.recv()).unwrap();
        app.handle_message(msg);
    }

    fn new_user_form(username: &str) -> UserForm {
        UserForm {
            username: username.to_string(),
            password: "secret".to_string(),
            full_name: "Anna Smirnova".to_string(),
            is_open: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_save_user_adds_to_roster_after_store_write() {
        let (_dir, mut app) = signed_in_app();
        app.user_form = new_user_form("doctor2");

        app.save_user();
        assert!(app.users.find("doctor2").is_none());

        settle(&mut app);
        assert!(app.users.find("doctor2").unwrap().id.is_some());
        assert!(app.user_form.username.is_empty());
        assert!(app.error_message.is_none());
    }

    #[test]
    fn test_failed_user_insert_leaves_roster_unchanged() {
        let (_dir, mut app) = signed_in_app();
        // The store still holds doctor1, so the insert hits the unique index
        app.users.remove_user("doctor1");
        app.user_form = new_user_form("doctor1");

        app.save_user();
        settle(&mut app);

        assert!(app.users.find("doctor1").is_none());
        assert!(app.error_message.is_some());
        assert_eq!(app.user_form.username, "doctor1");
    }

    #[test]
    fn test_delete_user_waits_for_store() {
        let (_dir, mut app) = signed_in_app();

        app.delete_user("nurse1");
        assert!(app.users.find("nurse1").is_some());

        settle(&mut app);
        assert!(app.users.find("nurse1").is_none());
    }

    #[test]
    fn test_failed_user_delete_keeps_user() {
        let (_dir, mut app) = signed_in_app();
        app.rt.block_on(app.pool.clone().close()).unwrap();

        app.delete_user("nurse1");
        settle(&mut app);

        assert!(app.users.find("nurse1").is_some());
        assert!(app.error_message.is_some());
    }

    #[test]
    fn test_batch_export_requires_export_permission() {
        let (_dir, mut app) = signed_in_app();
        app.users.logout();
        assert!(app.users.login("doctor1", "doc123"));

        app.export_results();
        assert!(app.error_message.as_deref().is_some_and(|e| e.contains("export_data")));
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension(PathBuf::from("report"), "xlsx"), PathBuf::from("report.xlsx"));
        assert_eq!(with_extension(PathBuf::from("report.csv"), "xlsx"), PathBuf::from("report.csv"));
    }
}
