use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::commitment::Commitment;
use crate::domain::secret::PendingSecret;
use crate::ports::store::{SecretStore, StoreError};

const SECRET_EXT: &str = "json";
const TMP_SUFFIX: &str = ".tmp";

/// File-backed `SecretStore`: one `0x<commitment>.json` file per pending order.
///
/// Writes go to a temporary file that is fsynced and atomically renamed into
/// place, then the directory is fsynced, so a secret is on disk before `put`
/// returns. Each commitment has its own async lock; operations on different
/// commitments run concurrently.
pub struct FileSecretStore {
    dir: PathBuf,
    locks: Mutex<HashMap<Commitment, Arc<Mutex<()>>>>,
}

impl FileSecretStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `commitment`.
    pub fn path_for(&self, commitment: Commitment) -> PathBuf {
        self.dir
            .join(format!("{}.{SECRET_EXT}", commitment.to_hex()))
    }

    fn tmp_path_for(&self, commitment: Commitment) -> PathBuf {
        self.dir
            .join(format!(".{}.{SECRET_EXT}{TMP_SUFFIX}", commitment.to_hex()))
    }

    async fn key_lock(&self, commitment: Commitment) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(commitment).or_default().clone()
    }

    async fn release_key_lock(&self, commitment: Commitment) {
        let mut locks = self.locks.lock().await;
        // Only the table still references it: nobody holds or waits on it.
        if locks
            .get(&commitment)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&commitment);
        }
    }

    async fn read_record(&self, commitment: Commitment) -> Result<Option<PendingSecret>, StoreError> {
        let content = match fs::read(self.path_for(commitment)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                commitment,
                reason: e.to_string(),
            })
    }

    async fn write_record(&self, commitment: Commitment, secret: &PendingSecret) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(secret)?;
        let tmp = self.tmp_path_for(commitment);

        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, self.path_for(commitment)).await?;
        self.sync_dir().await
    }

    async fn put_locked(&self, commitment: Commitment, secret: &PendingSecret) -> Result<(), StoreError> {
        match self.read_record(commitment).await? {
            Some(existing) if &existing == secret => {
                debug!(%commitment, "secret already stored");
                Ok(())
            }
            Some(_) => Err(StoreError::Collision(commitment)),
            None => {
                self.write_record(commitment, secret).await?;
                debug!(%commitment, "secret persisted");
                Ok(())
            }
        }
    }

    #[cfg(unix)]
    async fn sync_dir(&self) -> Result<(), StoreError> {
        fs::File::open(&self.dir).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    async fn put(&self, commitment: Commitment, secret: &PendingSecret) -> Result<(), StoreError> {
        let lock = self.key_lock(commitment).await;
        let result = {
            let _guard = lock.lock().await;
            self.put_locked(commitment, secret).await
        };
        drop(lock);
        self.release_key_lock(commitment).await;
        result
    }

    async fn get(&self, commitment: Commitment) -> Result<Option<PendingSecret>, StoreError> {
        let lock = self.key_lock(commitment).await;
        let result = {
            let _guard = lock.lock().await;
            self.read_record(commitment).await
        };
        drop(lock);
        self.release_key_lock(commitment).await;
        result
    }

    async fn remove(&self, commitment: Commitment) -> Result<(), StoreError> {
        let lock = self.key_lock(commitment).await;
        let result = {
            let _guard = lock.lock().await;
            match fs::remove_file(self.path_for(commitment)).await {
                Ok(()) => {
                    debug!(%commitment, "secret removed");
                    self.sync_dir().await
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        };
        drop(lock);
        self.release_key_lock(commitment).await;
        result
    }

    async fn list_pending(&self) -> Result<Vec<Commitment>, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut pending = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Leftover temp files from an interrupted write are not secrets.
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(&format!(".{SECRET_EXT}")) else {
                continue;
            };
            match stem.parse::<Commitment>() {
                Ok(commitment) => pending.push(commitment),
                Err(e) => warn!(file = name, "ignoring unrecognised file in secret store: {e}"),
            }
        }

        pending.sort();
        Ok(pending)
    }
}
