//! Connection factory seam
//!
//! The handle cache never talks to a storage engine directly. It asks a
//! factory to open a realm's store and, when the entry is evicted or the
//! cache shuts down, asks the same factory to close it.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::realm::RealmId;

/// Opens and closes per-realm store handles.
///
/// Implementations must be safe to call concurrently and must not assume
/// they are the only opener of a given store: the cache calls `open` at most
/// once per live entry, but other processes may share the same files.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Open, ready-to-use connection to one realm's store
    type Handle: Send + Sync + 'static;

    /// Open the realm's store, running first-time schema setup if needed.
    ///
    /// On error nothing may be left allocated.
    async fn open(&self, realm: &RealmId) -> Result<Self::Handle, StoreError>;

    /// Release the handle's underlying resources.
    ///
    /// Called exactly once per handle, after its entry has left the cache.
    async fn close(&self, realm: &RealmId, handle: &Self::Handle) -> Result<(), StoreError>;
}
