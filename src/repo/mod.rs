//! On-disk node repository.
//!
//! # Layout
//! ```text
//! <root>/
//!     config.toml   NodeConfig
//!     repo.lock     held while a daemon owns the repository
//! ```
//!
//! # Ownership
//! `Repo::open` takes the lock before anything else reads the repository.
//! The `Repo` then has a single owner: the daemon until the node is built,
//! the node afterwards. Whoever owns it last calls [`Repo::close`].

pub mod lock;

use rand::Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{load_config, save_config, ConfigError, NodeConfig};
use crate::keys::BASE58_ALPHABET;

pub use lock::{LockError, RepoLock, LOCK_FILE};

/// Name of the configuration file inside a repository.
pub const CONFIG_FILE: &str = "config.toml";

/// Errors raised by repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("no repository found at {}, run with --init first", path.display())]
    NotInitialized { path: PathBuf },

    #[error("repository already initialized at {}", path.display())]
    AlreadyInitialized { path: PathBuf },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("repository config: {0}")]
    Config(#[from] ConfigError),

    #[error("repository I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An opened, locked repository.
#[derive(Debug)]
pub struct Repo {
    root: PathBuf,
    config: NodeConfig,
    lock: RepoLock,
}

impl Repo {
    /// Whether `root` holds an initialized repository.
    pub fn is_initialized(root: &Path) -> bool {
        root.join(CONFIG_FILE).is_file()
    }

    /// First-run setup: create the directory and write a default config with
    /// a freshly generated identity.
    pub fn init(root: &Path) -> Result<NodeConfig, RepoError> {
        Self::init_with(root, NodeConfig::default())
    }

    /// First-run setup starting from `config`. An empty peer id is replaced by
    /// a generated one.
    pub fn init_with(root: &Path, mut config: NodeConfig) -> Result<NodeConfig, RepoError> {
        if Self::is_initialized(root) {
            return Err(RepoError::AlreadyInitialized {
                path: root.to_path_buf(),
            });
        }

        std::fs::create_dir_all(root)?;
        if config.identity.peer_id.is_empty() {
            config.identity.peer_id = generate_peer_id();
        }
        save_config(&root.join(CONFIG_FILE), &config)?;

        println!("initializing node at {}", root.display());
        println!("peer identity: {}", config.identity.peer_id);
        tracing::info!(
            path = %root.display(),
            peer_id = %config.identity.peer_id,
            "Repository initialized"
        );
        Ok(config)
    }

    /// Lock the repository at `root` and load its configuration.
    pub fn open(root: &Path) -> Result<Self, RepoError> {
        if !Self::is_initialized(root) {
            return Err(RepoError::NotInitialized {
                path: root.to_path_buf(),
            });
        }

        let mut lock = RepoLock::acquire(root)?;
        let config = match load_config(&root.join(CONFIG_FILE)) {
            Ok(config) => config,
            Err(e) => {
                lock.release()?;
                return Err(e.into());
            }
        };

        tracing::info!(path = %root.display(), "Repository opened");
        Ok(Self {
            root: root.to_path_buf(),
            config,
            lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Release the repository lock.
    pub fn close(mut self) -> Result<(), RepoError> {
        self.lock.release()?;
        tracing::info!(path = %self.root.display(), "Repository closed");
        Ok(())
    }
}

/// Generate a random base58 peer identifier.
pub fn generate_peer_id() -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..44)
        .map(|_| BASE58_ALPHABET[rng.gen_range(0..BASE58_ALPHABET.len())] as char)
        .collect();
    format!("Qm{}", body)
}
