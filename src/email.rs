//! Delivery of analysis results by email.

use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use crate::models::analysis::ResultData;
use crate::reference::{EMAIL_UNKNOWN_RANGE, reference_range};

/// SMTP client for sending analysis results over STARTTLS.
#[derive(Debug, Clone)]
pub struct EmailSender {
    host: String,
    port: u16,
    username: String,
    password: String,
    sender_name: String,
}

impl EmailSender {
    /// Build a sender from configuration. Empty credentials fall back to
    /// `MAIL_USERNAME` / `MAIL_PASSWORD`.
    pub fn from_config(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.resolved_username(),
            password: config.resolved_password(),
            sender_name: config.sender_name.clone(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// True when a login is known; sending without one always fails.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Compose the result email with optional attachments. Paths that are
    /// not regular files are skipped.
    pub fn build_message(
        &self,
        recipient: &str,
        subject: &str,
        patient_name: &str,
        analysis_name: &str,
        result: &ResultData,
        attachments: &[PathBuf],
    ) -> Result<Message> {
        let from = Mailbox::new(
            Some(self.sender_name.clone()).filter(|n| !n.is_empty()),
            self.username.parse()?,
        );
        let to: Mailbox = recipient.trim().parse()?;

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(build_html_body(
            patient_name,
            analysis_name,
            result,
        )));

        let octet_stream =
            ContentType::parse("application/octet-stream").map_err(|e| AppError::email(e.to_string()))?;

        for path in attachments {
            if !path.is_file() {
                tracing::warn!("Skipping attachment {}: not a file", path.display());
                continue;
            }
            let content = std::fs::read(path)?;
            body = body.singlepart(Attachment::new(attachment_name(path)).body(content, octet_stream.clone()));
        }

        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(body)?)
    }

    /// Send analysis results. Returns false and logs the cause on any
    /// failure; nothing is retried.
    pub fn send_analysis_results(
        &self,
        recipient: &str,
        subject: &str,
        patient_name: &str,
        analysis_name: &str,
        result: &ResultData,
        attachments: &[PathBuf],
    ) -> bool {
        match self.try_send(recipient, subject, patient_name, analysis_name, result, attachments) {
            Ok(()) => {
                tracing::info!("Sent results of '{}' to {}", analysis_name, recipient);
                true
            }
            Err(e) => {
                tracing::error!("Failed to send email to {}: {}", recipient, e);
                false
            }
        }
    }

    fn try_send(
        &self,
        recipient: &str,
        subject: &str,
        patient_name: &str,
        analysis_name: &str,
        result: &ResultData,
        attachments: &[PathBuf],
    ) -> Result<()> {
        let message = self.build_message(recipient, subject, patient_name, analysis_name, result, attachments)?;

        let transport = SmtpTransport::starttls_relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(self.username.clone(), self.password.clone()))
            .build();

        transport.send(&message)?;
        Ok(())
    }
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

const STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; }
.container { width: 80%; margin: 0 auto; padding: 20px; }
h1 { color: #2c3e50; }
h2 { color: #3498db; }
table { border-collapse: collapse; width: 100%; margin-top: 20px; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }
tr:nth-child(even) { background-color: #f9f9f9; }";

/// Render the HTML body: greeting, then a parameter / value / reference
/// range table. Non-tabular results fill one spanning cell.
pub fn build_html_body(patient_name: &str, analysis_name: &str, result: &ResultData) -> String {
    let mut rows = String::new();
    match result {
        ResultData::Table(pairs) => {
            for (param, value) in pairs {
                rows.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    escape_html(param),
                    escape_html(value),
                    escape_html(reference_range(param).unwrap_or(EMAIL_UNKNOWN_RANGE)),
                ));
            }
        }
        ResultData::Text(text) => {
            rows.push_str(&format!("<tr><td colspan=\"3\">{}</td></tr>\n", escape_html(text)));
        }
        ResultData::Empty => {}
    }

    format!(
        "<html>
<head><style>
{STYLE}
</style></head>
<body>
<div class=\"container\">
<h1>Analysis results</h1>
<p>Dear <strong>{patient}</strong>,</p>
<p>Please find below the results of your <strong>{analysis}</strong> analysis.</p>
<h2>Results:</h2>
<table>
<tr><th>Parameter</th><th>Value</th><th>Reference range</th></tr>
{rows}</table>
<p>Best regards,<br>Medical Center</p>
</div>
</body>
</html>
",
        patient = escape_html(patient_name),
        analysis = escape_html(analysis_name),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> EmailSender {
        EmailSender::from_config(&SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "lab@example.com".to_string(),
            password: "secret".to_string(),
            sender_name: "Medical Center".to_string(),
        })
    }

    fn blood_test() -> ResultData {
        ResultData::Table(vec![
            ("Hemoglobin".to_string(), "135 g/l".to_string()),
            ("Ferritin".to_string(), "80 ng/ml".to_string()),
        ])
    }

    #[test]
    fn test_html_body_table_rows() {
        let html = build_html_body("Ivan Ivanov", "Complete blood count", &blood_test());
        assert!(html.contains("<strong>Ivan Ivanov</strong>"));
        assert!(html.contains("<td>Hemoglobin</td><td>135 g/l</td><td>120-160 g/l (F), 130-170 g/l (M)</td>"));
        assert!(html.contains("<td>Ferritin</td><td>80 ng/ml</td><td>not specified</td>"));
    }

    #[test]
    fn test_html_body_text_result_spans_columns() {
        let html = build_html_body("Ivan", "Urine test", &ResultData::Text("negative".to_string()));
        assert!(html.contains("<td colspan=\"3\">negative</td>"));
    }

    #[test]
    fn test_html_body_escapes_values() {
        let html = build_html_body("<b>Eve</b>", "A & B", &ResultData::Text("x < 5".to_string()));
        assert!(html.contains("&lt;b&gt;Eve&lt;/b&gt;"));
        assert!(html.contains("A &amp; B"));
        assert!(html.contains("x &lt; 5"));
        assert!(!html.contains("<b>Eve"));
    }

    #[test]
    fn test_config_credentials_take_precedence() {
        let sender = sender();
        assert_eq!(sender.username(), "lab@example.com");
        assert!(sender.has_credentials());
    }

    #[test]
    fn test_build_message_headers() {
        let message = sender()
            .build_message(
                "patient@example.com",
                "Your results",
                "Ivan Ivanov",
                "Complete blood count",
                &blood_test(),
                &[],
            )
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("To: patient@example.com"));
        assert!(raw.contains("Subject: Your results"));
        assert!(raw.contains("lab@example.com"));
    }

    #[test]
    fn test_build_message_skips_missing_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("report.docx");
        std::fs::write(&existing, b"docx bytes").unwrap();
        let missing = dir.path().join("missing.docx");

        let message = sender()
            .build_message(
                "patient@example.com",
                "Your results",
                "Ivan Ivanov",
                "Complete blood count",
                &blood_test(),
                &[existing, missing, dir.path().to_path_buf()],
            )
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("report.docx"));
        assert!(!raw.contains("missing.docx"));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let result = sender().build_message("not an address", "s", "p", "a", &ResultData::Empty, &[]);
        assert!(matches!(result, Err(AppError::Email(_))));
    }

    #[test]
    fn test_send_failure_returns_false() {
        let sender = EmailSender::from_config(&SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "lab@example.com".to_string(),
            password: "secret".to_string(),
            sender_name: String::new(),
        });
        // Address parsing fails before any connection is attempted.
        assert!(!sender.send_analysis_results("bad", "s", "p", "a", &ResultData::Empty, &[]));
    }
}
