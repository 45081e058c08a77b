//! Text and JSON rendering of command results

use crate::commands::CommandOutput;
use adt_core::{ActivationReport, ObjectInfo, Severity, TableData};
use anyhow::{Context, Result};
use std::fmt::Write;

/// Render a command result for stdout
///
/// # Errors
/// JSON serialization failures
pub fn render(output: &CommandOutput, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(output).context("cannot serialize output");
    }

    let mut out = String::new();
    match output {
        CommandOutput::Connected {
            host,
            username,
            client,
        } => {
            let _ = writeln!(out, "connected to {host} as {username} (client {client})");
        }
        CommandOutput::Source(source) => {
            out.push_str(&source.source);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        CommandOutput::Search(result) => {
            let _ = writeln!(out, "{} object(s)", result.total);
            write_objects(&mut out, &result.objects);
        }
        CommandOutput::Packages(packages) => {
            for package in packages {
                let _ = writeln!(out, "{:<30} {}", package.name, package.description);
            }
        }
        CommandOutput::Package(package) => {
            let _ = writeln!(
                out,
                "{} ({} object(s))",
                package.name,
                package.objects.len()
            );
            write_objects(&mut out, &package.objects);
        }
        CommandOutput::Mutation(outcome) => {
            let _ = writeln!(out, "{} saved", outcome.object);
            match &outcome.activation {
                Some(report) => write_activation(&mut out, report),
                None => out.push_str("not activated\n"),
            }
        }
        CommandOutput::Type(info) => {
            let _ = writeln!(out, "{} ({:?})", info.name, info.kind);
            out.push_str(&info.source);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        CommandOutput::Table(data) => write_table(&mut out, data),
        CommandOutput::Transaction(info) => {
            let _ = writeln!(out, "{}  {}", info.transaction_code, info.description);
            let _ = writeln!(out, "package      {}", info.package);
            let _ = writeln!(out, "application  {}", info.application);
            if !info.program.is_empty() {
                let _ = writeln!(out, "program      {}", info.program);
            }
        }
    }
    Ok(out)
}

fn write_objects(out: &mut String, objects: &[ObjectInfo]) {
    for object in objects {
        let _ = writeln!(
            out,
            "{:<10} {:<30} {}",
            object.object_type, object.name, object.description
        );
    }
}

fn write_activation(out: &mut String, report: &ActivationReport) {
    if report.has_errors() {
        out.push_str("activation failed\n");
    } else {
        out.push_str("activated\n");
    }
    for message in &report.messages {
        let marker = match message.severity {
            Severity::Error => 'E',
            Severity::Warning => 'W',
            Severity::Info => 'I',
        };
        let _ = write!(out, "  {marker} {}", message.text);
        if let Some(location) = &message.location {
            let _ = write!(out, " ({location})");
        }
        out.push('\n');
    }
}

fn write_table(out: &mut String, data: &TableData) {
    let _ = writeln!(out, "{} ({} row(s))", data.table_name, data.row_count);

    let columns: Vec<&str> = if data.columns.is_empty() {
        data.rows
            .first()
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    } else {
        data.columns.iter().map(|c| c.name.as_str()).collect()
    };
    let _ = writeln!(out, "{}", columns.join("\t"));

    for row in &data.rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| match row.get(*column) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join("\t"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adt_core::{ActivationMessage, MutationOutcome, ObjectKind, SearchResult};
    use pretty_assertions::assert_eq;

    #[test]
    fn search_as_text() {
        let output = CommandOutput::Search(SearchResult {
            objects: vec![ObjectInfo {
                name: "ZHELLO".into(),
                object_type: "PROG/P".into(),
                description: "Hello".into(),
                ..ObjectInfo::default()
            }],
            total: 1,
        });

        let text = render(&output, false).unwrap();
        assert_eq!(
            text,
            "1 object(s)\nPROG/P     ZHELLO                         Hello\n"
        );
    }

    #[test]
    fn activation_messages_as_text() {
        let output = CommandOutput::Mutation(MutationOutcome {
            object: ObjectKind::Program.reference("ZTEST", None).unwrap(),
            activation: Some(ActivationReport {
                messages: vec![ActivationMessage {
                    severity: Severity::Error,
                    text: "Statement is not accessible.".into(),
                    location: Some("ZTEST line 3".into()),
                }],
            }),
        });

        let text = render(&output, false).unwrap();
        assert!(text.starts_with("PROGRAM ZTEST saved\nactivation failed\n"));
        assert!(text.contains("  E Statement is not accessible. (ZTEST line 3)"));
    }

    #[test]
    fn transaction_as_text() {
        let output = CommandOutput::Transaction(adt_core::TransactionInfo {
            transaction_code: "SE38".into(),
            description: "ABAP Editor".into(),
            package: "SEDT".into(),
            application: "BC-DWB-TOO".into(),
            ..adt_core::TransactionInfo::default()
        });

        let text = render(&output, false).unwrap();
        assert_eq!(text, "SE38  ABAP Editor\npackage      SEDT\napplication  BC-DWB-TOO\n");
    }

    #[test]
    fn table_as_text_and_json() {
        let data: TableData = serde_json::from_str(
            r#"{"table_name":"T000","row_count":1,"rows":[{"MANDT":"000","MTEXT":null}]}"#,
        )
        .unwrap();
        let output = CommandOutput::Table(data);

        let text = render(&output, false).unwrap();
        assert_eq!(text, "T000 (1 row(s))\nMANDT\tMTEXT\n000\t\n");

        let json = render(&output, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["table_name"], "T000");
    }
}
