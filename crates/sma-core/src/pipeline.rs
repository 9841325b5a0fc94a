//! `save`: history → filter → fetch attachments → document → XML (+ zip).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::archive::{
    archive_name, build_document, normalize_channel, render_document, zip_dir, ArchiveDocument,
    ArchiveLayout, ArchiveSummary, Stylesheet,
};
use crate::config::SmaConfig;
use crate::error::ArchiveError;
use crate::fetch::{CurlFetcher, FetchEvent, FetchExecutor, FetchScheduler, FileRef};
use crate::history::{
    collect_file_refs, filter_by_range, DateRange, ExportCommandSource, HistoryRecord,
    HistorySource, JsonFileSource,
};
use crate::users::{SlackUserDirectory, UserDirectory, UserIndex};

/// Parameters of one save.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub token: String,
    pub channel: String,
    pub range: DateRange,
    pub output_dir: PathBuf,
    pub stylesheet: Stylesheet,
    pub concurrency: usize,
    pub zip: bool,
}

impl SaveRequest {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel: channel.into(),
            range: DateRange::default(),
            output_dir: PathBuf::from("."),
            stylesheet: Stylesheet::Bundled,
            concurrency: crate::config::DEFAULT_CONCURRENCY,
            zip: false,
        }
    }

    /// Request seeded from the config file; callers override per-run flags.
    pub fn from_config(cfg: &SmaConfig, token: impl Into<String>, channel: impl Into<String>) -> Self {
        let mut req = Self::new(token, channel);
        req.concurrency = cfg.concurrency;
        req.zip = cfg.zip;
        req.stylesheet = Stylesheet::from_path(cfg.xsl.clone());
        if let Some(dir) = &cfg.output_dir {
            req.output_dir = dir.clone();
        }
        req
    }

    fn validated(&self) -> Result<(String, String), ArchiveError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(ArchiveError::MissingToken);
        }
        let channel = normalize_channel(&self.channel);
        if channel.is_empty() {
            return Err(ArchiveError::MissingChannel);
        }
        Ok((token.to_string(), channel))
    }
}

/// Messages in range and the attachments a save would fetch.
#[derive(Debug, Clone)]
pub struct SavePlan {
    pub channel: String,
    pub archive_name: String,
    pub messages: Vec<HistoryRecord>,
    pub files: Vec<FileRef>,
}

/// Drives one save end to end.
pub struct Archiver<E> {
    history: Arc<dyn HistorySource>,
    users: Arc<dyn UserDirectory>,
    executor: Arc<E>,
    events: Option<UnboundedSender<FetchEvent>>,
}

impl Archiver<CurlFetcher> {
    /// Production wiring: export command (or a saved export), `users.list`
    /// on the configured API base, libcurl transfers with the token.
    pub fn slack(cfg: &SmaConfig, token: &str, history_file: Option<PathBuf>) -> Self {
        let token = token.trim();
        let history: Arc<dyn HistorySource> = match history_file {
            Some(path) => Arc::new(JsonFileSource::new(path)),
            None => Arc::new(ExportCommandSource::new(cfg.history_command.clone())),
        };
        let users = Arc::new(SlackUserDirectory::new(
            cfg.api_base.clone(),
            token,
            cfg.transfer,
        ));
        let executor = Arc::new(CurlFetcher::new(token, cfg.transfer));
        Self::new(history, users, executor)
    }
}

impl<E> Archiver<E>
where
    E: FetchExecutor + 'static,
{
    pub fn new(
        history: Arc<dyn HistorySource>,
        users: Arc<dyn UserDirectory>,
        executor: Arc<E>,
    ) -> Self {
        Self {
            history,
            users,
            executor,
            events: None,
        }
    }

    /// Forward fetch progress events to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<FetchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Loads and filters the history and lists the attachments that would be
    /// fetched into `req.output_dir`. Touches nothing on disk.
    pub async fn plan(&self, req: &SaveRequest) -> Result<SavePlan, ArchiveError> {
        let (token, channel) = req.validated()?;
        let messages = self.messages_in_range(&token, &channel, &req.range).await?;
        let archive_name = archive_name(&channel, &req.range);
        let layout = ArchiveLayout::in_dir(&req.output_dir, archive_name.clone());
        let files = collect_file_refs(&messages, &layout.files_dir());
        Ok(SavePlan {
            channel,
            archive_name,
            messages,
            files,
        })
    }

    pub async fn save(&self, req: &SaveRequest) -> Result<ArchiveSummary, ArchiveError> {
        let (token, channel) = req.validated()?;
        let messages = self.messages_in_range(&token, &channel, &req.range).await?;
        tracing::info!(
            channel = %channel,
            count = messages.len(),
            "found messages in specified date range"
        );

        fs::create_dir_all(&req.output_dir)?;
        let output_dir = fs::canonicalize(&req.output_dir)?;
        let name = archive_name(&channel, &req.range);
        let layout = if req.zip {
            ArchiveLayout::scratch(&output_dir, name)?
        } else {
            ArchiveLayout::in_dir(&output_dir, name)
        };
        layout.create_dirs()?;

        let files = collect_file_refs(&messages, &layout.files_dir());
        if files.is_empty() {
            tracing::info!("no files to download");
        } else {
            tracing::info!(count = files.len(), limit = req.concurrency, "beginning fetch of files");
        }
        let mut scheduler = FetchScheduler::new(Arc::clone(&self.executor), req.concurrency);
        if let Some(tx) = &self.events {
            scheduler = scheduler.with_events(tx.clone());
        }
        let mut settled = false;
        let report = scheduler.run(files.clone(), |_| settled = true).await;
        if !settled {
            return Err(ArchiveError::Task("fetch phase ended without completing".into()));
        }

        let users = Arc::clone(&self.users);
        let index = UserIndex::new(tokio::task::spawn_blocking(move || users.list_users()).await??);

        let xml_file = layout.xml_file_name();
        let stylesheet = req.stylesheet.clone();
        let zip = req.zip;
        let range = req.range;
        let (doc, archive) = tokio::task::spawn_blocking(move || {
            let doc = build_document(&channel, &range, &messages, &index, &layout, &files, &report);
            write_archive(layout, &doc, &stylesheet, zip).map(|archive| (doc, archive))
        })
        .await??;

        Ok(summary(&doc, &output_dir, xml_file, archive))
    }

    async fn messages_in_range(
        &self,
        token: &str,
        channel: &str,
        range: &DateRange,
    ) -> Result<Vec<HistoryRecord>, ArchiveError> {
        let history = Arc::clone(&self.history);
        let (token, channel) = (token.to_string(), channel.to_string());
        let records =
            tokio::task::spawn_blocking(move || history.fetch_history(&token, &channel)).await??;
        let total = records.len();
        let kept = filter_by_range(records, range);
        tracing::debug!(total, kept = kept.len(), "filtered history by date range");
        if kept.is_empty() {
            return Err(ArchiveError::NoMessages);
        }
        Ok(kept)
    }
}

/// Writes XML and stylesheet into the layout, then zips when asked.
/// Returns the zip path and file name when packaged.
fn write_archive(
    layout: ArchiveLayout,
    doc: &ArchiveDocument,
    stylesheet: &Stylesheet,
    zip: bool,
) -> Result<Option<(PathBuf, String)>, ArchiveError> {
    let href = format!("{}/{}", layout.files_subdir_name(), stylesheet.file_name());
    fs::write(layout.xml_path(), render_document(doc, &href))?;
    stylesheet.install(&layout.files_subdir())?;
    tracing::info!(path = %layout.xml_path().display(), "wrote archive document");

    if !zip {
        layout.cleanup()?;
        return Ok(None);
    }
    let zip_path = layout.zip_path();
    zip_dir(layout.root(), &zip_path)?;
    let zip_file = layout.zip_file_name();
    layout.cleanup()?;
    tracing::info!(path = %zip_path.display(), "packaged archive");
    Ok(Some((zip_path, zip_file)))
}

fn summary(
    doc: &ArchiveDocument,
    output_dir: &Path,
    xml_file: String,
    archive: Option<(PathBuf, String)>,
) -> ArchiveSummary {
    let (archive_path, archive_file) = match archive {
        Some((path, file)) => (Some(path), Some(file)),
        None => (None, None),
    };
    ArchiveSummary {
        channel: doc.channel.clone(),
        from: doc.from.clone(),
        to: doc.to.clone(),
        write_folder: output_dir.to_path_buf(),
        filename: xml_file,
        messages: doc.messages.len(),
        files: doc.file_count,
        failed_files: doc.failed_files(),
        archive_path,
        archive_file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_requires_token_and_channel() {
        assert!(matches!(
            SaveRequest::new("  ", "general").validated(),
            Err(ArchiveError::MissingToken)
        ));
        assert!(matches!(
            SaveRequest::new("xoxp", "#").validated(),
            Err(ArchiveError::MissingChannel)
        ));
        let (token, channel) = SaveRequest::new(" xoxp ", "#general").validated().unwrap();
        assert_eq!(token, "xoxp");
        assert_eq!(channel, "general");
    }

    #[test]
    fn request_takes_config_defaults() {
        let cfg = SmaConfig {
            concurrency: 5,
            zip: true,
            output_dir: Some(PathBuf::from("/srv/out")),
            xsl: Some(PathBuf::from("/opt/site.xsl")),
            ..SmaConfig::default()
        };
        let req = SaveRequest::from_config(&cfg, "t", "c");
        assert_eq!(req.concurrency, 5);
        assert!(req.zip);
        assert_eq!(req.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(req.stylesheet, Stylesheet::Custom(PathBuf::from("/opt/site.xsl")));
        assert_eq!(SaveRequest::new("t", "c").output_dir, PathBuf::from("."));
    }
}
