//! `sma files` – list the attachments a save would fetch.

use anyhow::{Context, Result};
use serde_json::json;
use sma_core::config::SmaConfig;
use sma_core::Archiver;

use super::{build_request, SaveOptions};
use crate::cli::TargetArgs;

pub async fn run_files(cfg: &SmaConfig, target: &TargetArgs, json: bool) -> Result<()> {
    let req = build_request(cfg, target, &SaveOptions::default())?;
    let archiver = Archiver::slack(cfg, &req.token, target.history_file.clone());
    let plan = archiver
        .plan(&req)
        .await
        .with_context(|| format!("reading history of {}", req.channel))?;

    if json {
        let files: Vec<_> = plan
            .files
            .iter()
            .map(|f| json!({ "id": f.id, "url": f.source_url, "dest": f.dest_path }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "archive": plan.archive_name,
                "messages": plan.messages.len(),
                "files": files,
            }))?
        );
        return Ok(());
    }

    println!("{}: {} messages in range", plan.archive_name, plan.messages.len());
    if plan.files.is_empty() {
        println!("No files to download.");
    } else {
        println!("{:<12} {}", "ID", "DEST");
        for f in &plan.files {
            println!("{:<12} {}", f.id, f.dest_path.display());
        }
    }
    Ok(())
}
