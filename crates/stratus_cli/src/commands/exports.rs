//! Exports command - List the persisted export table.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use stratus_core::{exports_path, ExportTable};

use super::{load_config, OutputFormat};

#[derive(Args)]
pub struct ExportsArgs {
    /// Directory holding the export table
    #[arg(long, env = "STRATUS_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

pub async fn execute(args: ExportsArgs, config_path: Option<&Path>) -> Result<()> {
    let state_dir = match args.state_dir {
        Some(dir) => dir,
        None => load_config(config_path)?.state_dir,
    };
    let table = ExportTable::load(&exports_path(&state_dir))?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
        OutputFormat::Text => print!("{}", render_table(&table)),
    }
    Ok(())
}

fn render_table(table: &ExportTable) -> String {
    if table.is_empty() {
        return "No exports published\n".to_string();
    }

    let mut out = String::new();
    for record in table.records() {
        let source = match (&record.producing_stack, record.kind) {
            (Some(stack), Some(kind)) => format!("{} {}", stack, kind),
            _ => "value".to_string(),
        };
        out.push_str(&format!(
            "{:<28} {:<40} {} ({})\n",
            record.name,
            record.value,
            source,
            record.exported_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out
}
