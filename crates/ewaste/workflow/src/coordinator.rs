use crate::media::{MediaStore, NoMediaStore};
use ewaste_storage::memory::InMemoryEwasteStorage;
use ewaste_storage::EwasteStorage;
use std::sync::Arc;

/// Binds the item registry, pickup ledger and status history.
///
/// Every operation takes the resolved [`ewaste_types::Principal`] of the
/// caller, checks role, then relationship, then state, and hands the
/// mutation to the store as one atomic unit. Operations live in the
/// `registry`, `ledger`, `history` and `catalog` modules.
pub struct WorkflowCoordinator {
    pub(crate) storage: Arc<dyn EwasteStorage>,
    pub(crate) media: Arc<dyn MediaStore>,
}

impl WorkflowCoordinator {
    pub fn new(storage: Arc<dyn EwasteStorage>, media: Arc<dyn MediaStore>) -> Self {
        Self { storage, media }
    }

    /// Coordinator over the in-memory store and no media.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryEwasteStorage::new()), Arc::new(NoMediaStore))
    }

    pub fn storage(&self) -> Arc<dyn EwasteStorage> {
        Arc::clone(&self.storage)
    }
}
