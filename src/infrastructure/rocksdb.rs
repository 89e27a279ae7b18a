use crate::domain::ports::{PortResult, SessionStore};
use crate::domain::session::PaymentSession;
use crate::error::UpstreamError;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding serialized payment sessions keyed by session id.
pub const CF_SESSIONS: &str = "sessions";

/// A persistent session store backed by RocksDB.
///
/// Sessions are stored as JSON under their id in a dedicated Column Family,
/// so a record written by an older build (without a handler version tag)
/// still decodes as a V1 session.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbSessionStore {
    db: Arc<DB>,
}

impl RocksDbSessionStore {
    /// Opens or creates a RocksDB instance at `path`, ensuring the
    /// "sessions" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> PortResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_sessions = ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_sessions])
            .map_err(|e| UpstreamError::Storage(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn sessions_cf(&self) -> PortResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_SESSIONS)
            .ok_or_else(|| UpstreamError::Storage("Sessions column family not found".to_string()))
    }
}

#[async_trait]
impl SessionStore for RocksDbSessionStore {
    async fn put(&self, session: PaymentSession) -> PortResult<()> {
        let cf = self.sessions_cf()?;
        let value = serde_json::to_vec(&session)?;
        self.db
            .put_cf(cf, session.id.as_bytes(), value)
            .map_err(|e| UpstreamError::Storage(e.to_string()))
    }

    async fn get(&self, session_id: &str) -> PortResult<Option<PaymentSession>> {
        let cf = self.sessions_cf()?;
        let bytes = self
            .db
            .get_pinned_cf(cf, session_id.as_bytes())
            .map_err(|e| UpstreamError::Storage(e.to_string()))?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
