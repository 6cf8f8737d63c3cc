use serde::{Deserialize, Serialize};

fn default_retries() -> usize {
    3
}

fn default_workers() -> usize {
    4
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub remote: Option<RemoteConfig>,

    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            remote: None,
            archive: ArchiveConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,

    /// Identity the session acts as; repositories are addressed under it.
    pub owner_id: String,

    /// Attempts per remote call, including the first.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Concurrent leaf fetches while building an archive. 1 disables the pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}
