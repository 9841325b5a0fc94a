//! `sma save` – export a channel into an archive.

use anyhow::{Context, Result};
use sma_core::archive::{ArchiveSummary, Stylesheet};
use sma_core::config::SmaConfig;
use sma_core::fetch::FetchEvent;
use sma_core::history::DateRange;
use sma_core::{Archiver, SaveRequest};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cli::TargetArgs;

/// Flags that only apply to `save`.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub xsl: Option<PathBuf>,
    pub concurrency: Option<usize>,
    /// `None` keeps the config value.
    pub zip: Option<bool>,
    pub json: bool,
}

/// `--zip` / `--no-zip`; neither keeps the config value.
pub fn zip_choice(zip: bool, no_zip: bool) -> Option<bool> {
    match (zip, no_zip) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

/// Config values first, then command-line overrides.
pub fn build_request(cfg: &SmaConfig, target: &TargetArgs, opts: &SaveOptions) -> Result<SaveRequest> {
    let token = target.token.as_deref().unwrap_or_default().trim();
    let mut req = SaveRequest::from_config(cfg, token, target.channel.clone());
    req.range = DateRange::parse(target.from.as_deref(), target.to.as_deref())?;
    if let Some(dir) = &target.dir {
        req.output_dir = dir.clone();
    }
    if let Some(xsl) = &opts.xsl {
        req.stylesheet = Stylesheet::Custom(xsl.clone());
    }
    if let Some(n) = opts.concurrency {
        req.concurrency = n;
    }
    if let Some(zip) = opts.zip {
        req.zip = zip;
    }
    Ok(req)
}

pub async fn run_save(cfg: &SmaConfig, target: &TargetArgs, opts: &SaveOptions) -> Result<()> {
    let req = build_request(cfg, target, opts)?;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let archiver = Archiver::slack(cfg, &req.token, target.history_file.clone()).with_events(tx);
    let progress = tokio::spawn(print_progress(rx));

    let result = archiver.save(&req).await;
    // Closes the event channel so the progress task ends.
    drop(archiver);
    let _ = progress.await;

    let summary = result.with_context(|| format!("saving channel {}", req.channel))?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

async fn print_progress(mut rx: UnboundedReceiver<FetchEvent>) {
    let mut done = 0usize;
    while let Some(event) = rx.recv().await {
        match event {
            FetchEvent::Dispatched { .. } => {}
            FetchEvent::Completed { id, error } => {
                done += 1;
                match error {
                    None => eprintln!("[{}] fetched {}", done, id),
                    Some(e) => eprintln!("[{}] failed {}: {}", done, id, e),
                }
            }
            FetchEvent::Finished { completed, failed } if completed > 0 => {
                eprintln!("finished downloading: {} files, {} failed", completed, failed);
            }
            FetchEvent::Finished { .. } => {}
        }
    }
}

fn print_summary(s: &ArchiveSummary) {
    println!(
        "archived {} messages ({} with files) from #{}",
        s.messages, s.files, s.channel
    );
    println!("  from: {}", s.from);
    println!("  to:   {}", s.to);
    match &s.archive_path {
        Some(zip) => println!("  zip:  {}", zip.display()),
        None => println!("  xml:  {}", s.write_folder.join(&s.filename).display()),
    }
    if s.failed_files > 0 {
        println!("  {} attachment(s) could not be downloaded", s.failed_files);
    }
}
