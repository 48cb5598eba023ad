use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};

use crate::authorization::DecryptionAuthorization;
use crate::cache::{AuthorizationCacheKey, AuthorizationStore};

const CF_AUTHORIZATIONS: &str = "authorizations";

/// Authorization store that survives restarts.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
}

impl RocksDbStore {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = vec![ColumnFamilyDescriptor::new(
            CF_AUTHORIZATIONS,
            Options::default(),
        )];

        let db = DB::open_cf_descriptors(&opts, path, families)
            .map_err(|e| anyhow::anyhow!("Failed to open RocksDB: {}", e))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl AuthorizationStore for RocksDbStore {
    fn get(&self, key: &AuthorizationCacheKey) -> Result<Option<DecryptionAuthorization>> {
        let cf = self
            .db
            .cf_handle(CF_AUTHORIZATIONS)
            .context("Column family 'authorizations' missing")?;

        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => {
                let record = wincode::deserialize::<DecryptionAuthorization>(&bytes)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, key: AuthorizationCacheKey, record: DecryptionAuthorization) -> Result<()> {
        let cf = self
            .db
            .cf_handle(CF_AUTHORIZATIONS)
            .context("Column family 'authorizations' missing")?;

        let bytes = wincode::serialize(&record)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn remove(&mut self, key: &AuthorizationCacheKey) -> Result<()> {
        let cf = self
            .db
            .cf_handle(CF_AUTHORIZATIONS)
            .context("Column family 'authorizations' missing")?;

        self.db.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<AuthorizationCacheKey>> {
        let cf = self
            .db
            .cf_handle(CF_AUTHORIZATIONS)
            .context("Column family 'authorizations' missing")?;

        let mut keys = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            let raw: [u8; 32] = key
                .as_ref()
                .try_into()
                .context("Malformed authorization cache key")?;
            keys.push(AuthorizationCacheKey(raw));
        }
        Ok(keys)
    }
}
