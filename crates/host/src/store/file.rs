use std::{
    io::ErrorKind,
    ops::Range,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tidepool_core::Proof;
use tokio::{fs, sync::Mutex};
use tracing::debug;

use super::{check_window, ProofStore, StoreError};

const META_FILE: &str = "meta.json";
const MERGED_FILE: &str = "merged.bin";

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreMeta {
    proof_count: u64,
    merged_from: u64,
    merged_until: u64,
    settled_until: u64,
}

impl StoreMeta {
    fn window(&self) -> Range<u64> {
        self.merged_from..self.merged_until
    }
}

/// Proof store backed by a directory of bincode files plus a JSON index.
///
/// The index is read on every access, so handles opened on the same
/// directory see each other's cursors.
#[derive(Debug)]
pub struct FileProofStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileProofStore {
    /// Open or create a store in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let store = Self {
            dir,
            lock: Mutex::new(()),
        };
        store.load_meta().await?;
        Ok(store)
    }

    /// Directory holding the proofs
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn proof_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("proof-{index:010}.bin"))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn load_meta(&self) -> Result<StoreMeta, StoreError> {
        match fs::read(self.dir.join(META_FILE)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Codec(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreMeta::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_meta(&self, meta: &StoreMeta) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(meta).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.write_atomic(&self.dir.join(META_FILE), &bytes).await
    }
}

fn encode(proof: &Proof) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(proof).map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Proof, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

#[async_trait]
impl ProofStore for FileProofStore {
    async fn get(&self, index: u64) -> Result<Proof, StoreError> {
        match fs::read(self.proof_path(index)).await {
            Ok(bytes) => decode(&bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(index)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, index: u64, proof: Proof) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write_atomic(&self.proof_path(index), &encode(&proof)?).await?;
        let mut meta = self.load_meta().await?;
        if index >= meta.proof_count {
            meta.proof_count = index + 1;
            self.save_meta(&meta).await?;
        }
        debug!("Stored proof {} in {}", index, self.dir.display());
        Ok(())
    }

    async fn get_merged(&self) -> Result<Option<Proof>, StoreError> {
        let _guard = self.lock.lock().await;
        if self.load_meta().await?.window().is_empty() {
            return Ok(None);
        }
        match fs::read(self.dir.join(MERGED_FILE)).await {
            Ok(bytes) => decode(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_merged(&self, proof: Proof, merged_until: u64) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut meta = self.load_meta().await?;
        check_window(&meta.window(), merged_until)?;
        self.write_atomic(&self.dir.join(MERGED_FILE), &encode(&proof)?).await?;
        meta.merged_until = merged_until;
        self.save_meta(&meta).await?;
        debug!("Stored merged proof {}..{}", meta.merged_from, merged_until);
        Ok(())
    }

    async fn start_merge(&self, at: u64) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut meta = self.load_meta().await?;
        meta.merged_from = at;
        meta.merged_until = at;
        // The empty window hides any stale merged file until it is replaced.
        self.save_meta(&meta).await?;
        match fs::remove_file(self.dir.join(MERGED_FILE)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!("Started merge window at {}", at);
        Ok(())
    }

    async fn proof_count(&self) -> Result<u64, StoreError> {
        Ok(self.load_meta().await?.proof_count)
    }

    async fn merged_range(&self) -> Result<Range<u64>, StoreError> {
        Ok(self.load_meta().await?.window())
    }

    async fn settled_until(&self) -> Result<u64, StoreError> {
        Ok(self.load_meta().await?.settled_until)
    }

    async fn set_settled_until(&self, until: u64) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut meta = self.load_meta().await?;
        meta.settled_until = until;
        self.save_meta(&meta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_core::{MethodKind, StateRoots};

    fn proof(tag: u8) -> Proof {
        Proof {
            method: MethodKind::Burn,
            public_input: StateRoots::empty(),
            public_output: StateRoots {
                burns: [tag; 32],
                ..StateRoots::empty()
            },
            payload: vec![tag; 32],
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_proofs() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileProofStore::open(dir.path()).await.unwrap();
            store.put(0, proof(1)).await.unwrap();
            store.put(1, proof(2)).await.unwrap();
            store.put_merged(proof(3), 2).await.unwrap();
            store.set_settled_until(2).await.unwrap();
        }

        let store = FileProofStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get(1).await.unwrap(), proof(2));
        assert_eq!(store.proof_count().await.unwrap(), 2);
        assert_eq!(store.merged_range().await.unwrap(), 0..2);
        assert_eq!(store.settled_until().await.unwrap(), 2);
        assert_eq!(store.get_merged().await.unwrap(), Some(proof(3)));
    }

    #[tokio::test]
    async fn test_restarted_window_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileProofStore::open(dir.path()).await.unwrap();
            store.put_merged(proof(1), 3).await.unwrap();
            store.start_merge(3).await.unwrap();
            assert!(store.get_merged().await.unwrap().is_none());
            assert!(matches!(
                store.put_merged(proof(2), 3).await,
                Err(StoreError::Window { from: 3, until: 3, requested: 3 })
            ));
            store.put_merged(proof(2), 4).await.unwrap();
        }

        let store = FileProofStore::open(dir.path()).await.unwrap();
        assert_eq!(store.merged_range().await.unwrap(), 3..4);
        assert_eq!(store.get_merged().await.unwrap(), Some(proof(2)));
    }

    #[tokio::test]
    async fn test_handles_share_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileProofStore::open(dir.path()).await.unwrap();
        let merger = FileProofStore::open(dir.path()).await.unwrap();

        writer.put(0, proof(1)).await.unwrap();
        merger.put_merged(proof(1), 1).await.unwrap();
        merger.set_settled_until(1).await.unwrap();
        writer.put(1, proof(2)).await.unwrap();

        assert_eq!(merger.proof_count().await.unwrap(), 2);
        assert_eq!(writer.merged_range().await.unwrap(), 0..1);
        assert_eq!(writer.settled_until().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_proof() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProofStore::open(dir.path()).await.unwrap();
        assert!(matches!(store.get(4).await, Err(StoreError::NotFound(4))));
        assert!(store.get_merged().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_proof() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProofStore::open(dir.path()).await.unwrap();
        fs::write(store.proof_path(0), b"nope").await.unwrap();
        assert!(matches!(store.get(0).await, Err(StoreError::Codec(_))));
    }
}
