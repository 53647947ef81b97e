//! CSV exports of the admin registration views.

use crate::filter::RegistrationRow;
use chrono::NaiveDate;

/// Columns of the registrations export.
pub const REGISTRATION_COLUMNS: [&str; 12] = [
    "Name",
    "Customer ID",
    "Mobile Number",
    "Category",
    "Program",
    "Program Description",
    "Program Conditions",
    "District",
    "Panchayath",
    "Agent",
    "Registration Date",
    "Status",
];

/// Columns of the stopped registrations export.
pub const STOPPED_COLUMNS: [&str; 11] = [
    "Name",
    "Customer ID",
    "Mobile Number",
    "Category",
    "Experience",
    "Skills",
    "District",
    "Panchayath",
    "Agent",
    "Registration Date",
    "Status",
];

fn should_neutralize(value: &str) -> bool {
    matches!(
        value.trim_start().chars().next(),
        Some('=' | '+' | '-' | '@')
    )
}

/// Escape one cell. Values that a spreadsheet would evaluate as a formula
/// are prefixed with `'`.
#[must_use]
pub fn csv_escape(value: &str) -> String {
    let safe = if should_neutralize(value) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if safe.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

fn render(columns: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut out = columns
        .iter()
        .map(|c| csv_escape(c))
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    for row in rows {
        out.push_str(
            &row.iter()
                .map(|cell| csv_escape(cell))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }
    out
}

fn text(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}

fn date(row: &RegistrationRow) -> String {
    row.registration_date.format("%Y-%m-%d").to_string()
}

/// Render registration rows with [`REGISTRATION_COLUMNS`].
#[must_use]
pub fn registrations_csv(rows: &[RegistrationRow]) -> String {
    render(
        &REGISTRATION_COLUMNS,
        rows.iter().map(|row| {
            vec![
                row.client_name.clone(),
                row.customer_id.clone(),
                row.mobile_number.clone(),
                row.category_name.clone(),
                text(row.program_name.as_ref()),
                text(row.program_description.as_ref()),
                text(row.program_conditions.as_ref()),
                text(row.district.as_ref()),
                text(row.panchayath.as_ref()),
                text(row.agent_pro.as_ref()),
                date(row),
                row.status.to_string(),
            ]
        }),
    )
}

/// Render stopped registrations with [`STOPPED_COLUMNS`].
#[must_use]
pub fn stopped_csv(rows: &[RegistrationRow]) -> String {
    render(
        &STOPPED_COLUMNS,
        rows.iter().map(|row| {
            vec![
                row.client_name.clone(),
                row.customer_id.clone(),
                row.mobile_number.clone(),
                row.category_name.clone(),
                text(row.experience.as_ref()),
                text(row.skills.as_ref()),
                text(row.district.as_ref()),
                text(row.panchayath.as_ref()),
                text(row.agent_pro.as_ref()),
                date(row),
                row.status.to_string(),
            ]
        }),
    )
}

/// `<prefix>_<YYYY-MM-DD>.csv`
#[must_use]
pub fn export_file_name(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}_{}.csv", day.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::status::RegistrationStatus;
    use crate::types::{CategoryId, ClientId, RegistrationId};
    use chrono::{TimeZone, Utc};

    fn sample() -> RegistrationRow {
        let when = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).single().unwrap();
        RegistrationRow {
            id: RegistrationId::new(),
            client_id: ClientId::new(),
            category_id: CategoryId::new(),
            program_id: None,
            mobile_number: "9847000001".into(),
            status: RegistrationStatus::StopRequested,
            experience: Some("5 years, catering".into()),
            skills: Some("=cmd".into()),
            registration_date: when,
            updated_at: when,
            client_name: "Anu \"Chechi\"".into(),
            customer_id: "C001".into(),
            district: Some("Kottayam".into()),
            panchayath: Some("Pala".into()),
            agent_pro: None,
            category_name: "foodelife".into(),
            program_name: Some("Bakery".into()),
            program_description: None,
            program_conditions: None,
        }
    }

    #[test]
    fn escape_quotes_and_formulas() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"x\""), "\"say \"\"x\"\"\"");
        assert_eq!(csv_escape("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(csv_escape("@x,y"), "\"'@x,y\"");
    }

    #[test]
    fn registrations_export_has_header_and_rows() {
        let csv = registrations_csv(&[sample()]);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Name,Customer ID,Mobile Number,Category,Program,"));
        assert_eq!(
            lines[1],
            "\"Anu \"\"Chechi\"\"\",C001,9847000001,foodelife,Bakery,,,Kottayam,Pala,,2025-03-14,stop_requested"
        );
    }

    #[test]
    fn stopped_export_includes_experience_and_skills() {
        let csv = stopped_csv(&[sample()]);
        let line = csv.lines().nth(1).unwrap();
        assert!(line.contains("\"5 years, catering\""));
        assert!(line.contains("'=cmd"));
    }

    #[test]
    fn file_name_carries_the_date() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(export_file_name("registrations", day), "registrations_2025-01-02.csv");
    }
}
