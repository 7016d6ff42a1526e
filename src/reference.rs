//! Reference ranges for common lab parameters.

/// Placeholder shown in emails for parameters without a known range.
pub const EMAIL_UNKNOWN_RANGE: &str = "not specified";
/// Placeholder shown in Word reports for parameters without a known range.
pub const REPORT_UNKNOWN_RANGE: &str = "No data";

const RANGES: &[(&str, &str)] = &[
    ("Hemoglobin", "120-160 g/l (F), 130-170 g/l (M)"),
    ("Erythrocytes", "3.8-5.2 x10^12/l (F), 4.2-5.6 x10^12/l (M)"),
    ("Leukocytes", "4.0-9.0 x10^9/l"),
    ("Platelets", "180-320 x10^9/l"),
    ("ESR", "2-15 mm/h"),
    ("Glucose", "3.3-5.5 mmol/l"),
    ("Cholesterol", "3.6-5.2 mmol/l"),
    ("Triglycerides", "0.45-1.7 mmol/l"),
    ("Bilirubin", "3.4-17.1 umol/l"),
    ("Total bilirubin", "3.4-20.5 umol/l"),
    ("ALT", "0-33 U/l (F), 0-41 U/l (M)"),
    ("AST", "0-32 U/l (F), 0-40 U/l (M)"),
    ("Creatinine", "44-80 umol/l (F), 62-106 umol/l (M)"),
    ("Urea", "2.5-6.7 mmol/l"),
    ("Uric acid", "154-357 umol/l (F), 202-416 umol/l (M)"),
    ("pH", "5.0-7.0"),
    ("Protein", "Absent"),
    ("Ketone bodies", "Absent"),
];

/// Reference range for a parameter name, matched exactly after trimming.
pub fn reference_range(parameter: &str) -> Option<&'static str> {
    let parameter = parameter.trim();
    RANGES
        .iter()
        .find(|(name, _)| *name == parameter)
        .map(|(_, range)| *range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_parameter() {
        assert_eq!(reference_range("Glucose"), Some("3.3-5.5 mmol/l"));
        assert_eq!(reference_range(" pH "), Some("5.0-7.0"));
    }

    #[test]
    fn test_unknown_parameter() {
        assert_eq!(reference_range("Ferritin"), None);
        assert_eq!(reference_range("glucose"), None);
        assert_eq!(reference_range("Ferritin").unwrap_or(EMAIL_UNKNOWN_RANGE), "not specified");
    }
}
