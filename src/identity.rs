use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Error;

/// Default sender shown to the operator when composing a campaign
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub from_name: String,
    pub from_email: String,
}

/// Keeps a `SenderIdentity` in a small TOML file, under the keys `from_name` and
/// `from_email`
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new<P: AsRef<Path>>(path: P) -> IdentityStore {
        IdentityStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &Config) -> Option<IdentityStore> {
        config.identity_path.as_ref().map(IdentityStore::new)
    }

    /// `None` if nothing has been saved yet
    pub fn load(&self) -> Result<Option<SenderIdentity>, Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(Some(toml::from_str(&text)?))
    }

    pub fn save(&self, identity: &SenderIdentity) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, toml::to_string(identity)?)?;
        debug!("Saved sender identity to {}", self.path.display());
        Ok(())
    }
}
