use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::config::TopicSettings;
use crate::error::{ConsError, Result};
use crate::topic::TopicContext;

#[derive(Debug, Default)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
    pub existing: Vec<PathBuf>,
}

/// Create the topic directory with a README skeleton and default settings.
/// Files that already exist are left alone.
pub fn init(dir: &Path, today: NaiveDate) -> Result<InitReport> {
    fs::create_dir_all(dir).map_err(|e| ConsError::io(dir, e))?;
    let topic = TopicContext::new(dir);
    let mut report = InitReport::default();

    let files = [
        (topic.readme_file(), readme_skeleton(today)),
        (topic.config_file(), TopicSettings::default().to_toml()),
    ];
    for (path, contents) in files {
        if create_new(&path, &contents)? {
            info!("Created {}", path.display());
            report.created.push(path);
        } else {
            report.existing.push(path);
        }
    }
    Ok(report)
}

fn readme_skeleton(today: NaiveDate) -> String {
    format!(
        "# New Consilio Topic\n\n\
         _Started {}_\n\n\
         Describe the decision you are facing: the options, what matters to you, \
         and any constraints.\n",
        today.format("%Y-%m-%d")
    )
}

/// Write `contents` only if `path` does not exist yet.
fn create_new(path: &Path, contents: &str) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(contents.as_bytes())
                .map_err(|e| ConsError::io(path, e))?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(ConsError::io(path, e)),
    }
}
