use colored::Colorize;
use serde_json::{json, Value};

use linkgraph_records::{Record, RecordGraph};

use crate::cli::OutputFormat;
use crate::script::{Outcome, StepReport};

pub fn print_report(graph: &RecordGraph, report: &StepReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", report_json(graph, report)),
        OutputFormat::Text => print_text(report),
    }
}

fn record_line(record: &Record) -> String {
    format!(
        "{} {}  rev {} (#{})",
        record.entity.to_string().cyan(),
        record.id.to_string().yellow(),
        record.revision_id.short_hex().dimmed(),
        record.seq
    )
}

fn print_text(report: &StepReport) {
    let header = format!("[{}] {}", report.number, report.op).bold();
    match &report.outcome {
        Outcome::Record(record) => {
            println!("{header} {} {}", "✓".green(), record_line(record));
            for (name, value) in &record.fields {
                println!("      {name}: {}", serde_json::to_string(value).unwrap_or_default().dimmed());
            }
        }
        Outcome::Deleted(revision) => {
            println!("{header} {} tombstoned at {}", "✓".green(), revision.short_hex().yellow());
        }
        Outcome::History(records) => {
            println!("{header} {} revisions", records.len());
            for record in records {
                println!("    {}", record_line(record));
            }
        }
        Outcome::Page(page) => {
            let more = if page.has_next_page { " (more)" } else { "" };
            println!("{header} {} match(es){more}", page.items.len().to_string().bold());
            for record in &page.items {
                println!("    {}", record_line(record));
            }
        }
        Outcome::IndexChecked { diff, fingerprint } if diff.is_clean() => {
            println!(
                "{header} {} index matches store  {}",
                "✓".green(),
                fingerprint.short_hex().dimmed()
            );
        }
        Outcome::IndexChecked { diff, .. } => {
            println!(
                "{header} {} {} missing, {} stale",
                "✗".red(),
                diff.missing.len(),
                diff.stale.len()
            );
        }
        Outcome::Rejected(err) => {
            println!("{header} {} {}", "rejected as expected:".yellow(), err);
        }
    }
}

fn report_json(graph: &RecordGraph, report: &StepReport) -> Value {
    let schema = graph.schema();
    let result = match &report.outcome {
        Outcome::Record(record) => record.to_json(schema),
        Outcome::Deleted(revision) => json!({ "deleted": revision.to_hex() }),
        Outcome::History(records) => {
            Value::Array(records.iter().map(|r| r.to_json(schema)).collect())
        }
        Outcome::Page(page) => json!({
            "items": page.items.iter().map(|r| r.to_json(schema)).collect::<Vec<_>>(),
            "hasNextPage": page.has_next_page,
            "endCursor": page.end_cursor.map(|c| c.to_string()),
        }),
        Outcome::IndexChecked { diff, fingerprint } => json!({
            "clean": diff.is_clean(),
            "missing": diff.missing.len(),
            "stale": diff.stale.len(),
            "fingerprint": fingerprint.to_hex(),
        }),
        Outcome::Rejected(err) => json!({ "error": err.to_string() }),
    };
    json!({
        "step": report.number,
        "op": report.op,
        "ok": !matches!(report.outcome, Outcome::Rejected(_)),
        "result": result,
    })
}
