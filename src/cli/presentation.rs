//! CLI presentation: text and json formatters per command.

use crate::cli::output::CliError;
use crate::op::{Effect, LogRecord, NodeMeta};
use crate::tree::walker::Entry;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;

/// Replica status for `movetree status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub peer_id: u64,
    pub clock: u64,
    pub log_len: usize,
    pub peers: Vec<PeerStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerStatus {
    pub peer_id: u64,
    pub high_water: Option<u64>,
    pub pending: usize,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::InvalidInput(e.to_string()))
}

fn detail(meta: &NodeMeta) -> String {
    match meta {
        NodeMeta::Directory { .. } => String::new(),
        NodeMeta::File { file_ref, .. } => format!("ref {}", file_ref),
        NodeMeta::Symlink { target, .. } => format!("-> {}", target),
    }
}

pub fn format_ls(entries: &[Entry], format: &str) -> Result<String, CliError> {
    if format == "json" {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                json!({
                    "path": e.path,
                    "id": e.id,
                    "meta": e.meta,
                })
            })
            .collect();
        return to_json(&rows);
    }
    if entries.is_empty() {
        return Ok("(empty)".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Id", "Kind", ""]);
    for e in entries {
        table.add_row(vec![
            e.path.clone(),
            e.id.to_string(),
            e.meta.kind().to_string(),
            detail(&e.meta),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_log(records: &[LogRecord], format: &str) -> Result<String, CliError> {
    if format == "json" {
        return to_json(records);
    }
    if records.is_empty() {
        return Ok("Log is empty".to_string());
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Timestamp", "Child", "Parent", "Name", "Effect"]);
    for r in records {
        let effect = match &r.effect {
            Effect::Applied { new_meta, .. } if new_meta.name() != r.op.new_meta.name() => {
                format!("renamed to {}", new_meta.name())
            }
            Effect::Applied { .. } => "applied".to_string(),
            Effect::Skipped(reason) => format!("skipped ({})", reason),
        };
        table.add_row(vec![
            r.timestamp.to_string(),
            r.op.child.to_string(),
            r.op.new_parent.to_string(),
            r.op.new_meta.name().to_string(),
            effect,
        ]);
    }
    Ok(table.to_string())
}

pub fn format_status(report: &StatusReport, format: &str) -> Result<String, CliError> {
    if format == "json" {
        return to_json(report);
    }
    let mut out = String::new();
    out.push_str(&format!("Peer: {}\n", report.peer_id));
    out.push_str(&format!("Clock: {}\n", report.clock));
    out.push_str(&format!("Log records: {}\n", report.log_len));
    if report.peers.is_empty() {
        out.push_str("No peers configured\n");
        return Ok(out);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Peer", "High-water", "Pending"]);
    for p in &report.peers {
        table.add_row(vec![
            p.peer_id.to_string(),
            p.high_water
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string()),
            p.pending.to_string(),
        ]);
    }
    out.push('\n');
    out.push_str(&table.to_string());
    Ok(out)
}
