use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;

use super::catalog::Catalogs;
use super::domain::{Lead, ResultRecord, UserId};
use super::notifications::describe_outcome;

const HEADERS: [&str; 14] = [
    "id",
    "created_at",
    "user_id",
    "product",
    "result_key",
    "result_name",
    "scores",
    "skipped",
    "name",
    "role",
    "company",
    "team_size",
    "contact",
    "lead_status",
];

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: Option<u64>,
    created_at: String,
    user_id: i64,
    product: &'static str,
    result_key: &'a str,
    result_name: String,
    scores: String,
    skipped: usize,
    name: &'a str,
    role: &'a str,
    company: &'a str,
    team_size: &'a str,
    contact: &'a str,
    lead_status: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv export failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One row per result, joined with the user's lead when one exists.
pub fn export_results_csv<W: Write>(
    records: &[ResultRecord],
    leads: &[Lead],
    catalogs: &Catalogs,
    writer: W,
) -> Result<(), ExportError> {
    let leads_by_user: HashMap<UserId, &Lead> =
        leads.iter().map(|lead| (lead.user_id, lead)).collect();

    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(HEADERS)?;

    for record in records {
        let lead = leads_by_user.get(&record.user_id).copied();
        let label = describe_outcome(&record.outcome, catalogs);

        csv_writer.serialize(ExportRow {
            id: record.id.map(|id| id.0),
            created_at: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            user_id: record.user_id.0,
            product: record.product().as_str(),
            result_key: record.outcome.primary_key(),
            result_name: label.name,
            scores: record.outcome.score_summary(),
            skipped: record.outcome.skipped(),
            name: lead.map(|lead| lead.name.as_str()).unwrap_or(""),
            role: lead.and_then(|lead| lead.role.as_deref()).unwrap_or(""),
            company: lead.and_then(|lead| lead.company.as_deref()).unwrap_or(""),
            team_size: lead.and_then(|lead| lead.team_size.as_deref()).unwrap_or(""),
            contact: lead.map(|lead| lead.contact.as_str()).unwrap_or(""),
            lead_status: lead.map(|lead| lead.status.as_str()).unwrap_or(""),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}
