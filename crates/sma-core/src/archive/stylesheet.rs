use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the bundled stylesheet inside the archive.
pub const DEFAULT_XSL_NAME: &str = "slack-message-archive.xsl";

/// Bundled stylesheet rendering `history/messages/message` as an HTML page.
pub const DEFAULT_XSL: &str = include_str!("default.xsl");

/// Stylesheet copied next to the attachments and referenced from the XML.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Stylesheet {
    #[default]
    Bundled,
    Custom(PathBuf),
}

impl Stylesheet {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(Stylesheet::Custom).unwrap_or_default()
    }

    /// Name under which the stylesheet is stored in the archive.
    pub fn file_name(&self) -> String {
        match self {
            Stylesheet::Bundled => DEFAULT_XSL_NAME.to_string(),
            Stylesheet::Custom(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_XSL_NAME.to_string()),
        }
    }

    /// Writes the stylesheet into `dir`, returning the written path.
    pub fn install(&self, dir: &Path) -> io::Result<PathBuf> {
        let dest = dir.join(self.file_name());
        match self {
            Stylesheet::Bundled => fs::write(&dest, DEFAULT_XSL)?,
            Stylesheet::Custom(src) => {
                fs::copy(src, &dest)?;
            }
        }
        Ok(dest)
    }
}
