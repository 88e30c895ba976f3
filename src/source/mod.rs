//! Document sources: where the text of a submitted folder comes from.
//!
//! | Provider | Folder id resolves to |
//! |----------|-----------------------|
//! | `drive` | a Google Drive folder, read through the Drive v3 REST API |
//! | `filesystem` | `<root>/<id>` on the local disk |
//!
//! Both return documents ordered by name so that repeated loads of the same
//! folder produce the same corpus.

mod drive;
mod filesystem;

pub use drive::DriveSource;
pub use filesystem::FilesystemSource;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::link::FolderId;
use crate::models::Document;

/// Loads the documents of one folder.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> &str;

    /// All readable documents in the folder, ordered by name.
    ///
    /// A folder with no readable documents is an error.
    async fn load(&self, folder: &FolderId) -> Result<Vec<Document>>;
}

/// Instantiate the source named by `source.provider`.
pub fn create_source(config: &SourceConfig) -> Result<Box<dyn DocumentSource>> {
    match config.provider.as_str() {
        "drive" => Ok(Box::new(DriveSource::new(&config.drive, config.timeout())?)),
        "filesystem" => {
            let fs = config.filesystem.as_ref().ok_or_else(|| {
                anyhow::anyhow!("source.provider is 'filesystem' but [source.filesystem] is missing")
            })?;
            Ok(Box::new(FilesystemSource::new(fs)?))
        }
        other => bail!("Unknown document source: '{}'", other),
    }
}

/// Concatenate document texts in order, without a separator.
pub fn concat_documents(docs: &[Document]) -> String {
    docs.iter().map(|d| d.text.as_str()).collect()
}
