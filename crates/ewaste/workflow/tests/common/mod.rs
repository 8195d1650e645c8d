#![allow(dead_code)]

use async_trait::async_trait;
use ewaste_storage::memory::InMemoryEwasteStorage;
use ewaste_types::{CategoryId, CategoryKind, DepartmentId, Item, Principal, PrincipalId};
use ewaste_workflow::{MediaError, MediaStore, NewItem, NoMediaStore, WorkflowCoordinator};
use std::sync::{Arc, Mutex};

pub struct Fixture {
    pub coordinator: Arc<WorkflowCoordinator>,
    pub category: CategoryId,
    pub department: DepartmentId,
    pub owner: Principal,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_media(Arc::new(NoMediaStore)).await
    }

    pub async fn with_media(media: Arc<dyn MediaStore>) -> Self {
        let coordinator = Arc::new(WorkflowCoordinator::new(
            Arc::new(InMemoryEwasteStorage::new()),
            media,
        ));
        let category = coordinator
            .ensure_category("Monitors", CategoryKind::Recyclable, None)
            .await
            .unwrap();
        let department = coordinator.ensure_department("Finance", None).await.unwrap();
        Self {
            coordinator,
            category: category.id,
            department: department.id,
            owner: Principal::user(PrincipalId::generate()),
        }
    }

    pub fn new_item(&self) -> NewItem {
        NewItem::new("Dell P2214H", self.category, self.department).disposed()
    }

    pub async fn reported_item(&self) -> Item {
        self.coordinator
            .create_item(&self.owner, self.new_item())
            .await
            .unwrap()
    }
}

pub fn vendor() -> Principal {
    Principal::vendor(PrincipalId::generate())
}

/// Media store that records every removal it is asked for.
#[derive(Default)]
pub struct RecordingMedia {
    removed: Mutex<Vec<String>>,
}

impl RecordingMedia {
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStore for RecordingMedia {
    async fn remove(&self, reference: &str) -> Result<(), MediaError> {
        self.removed.lock().unwrap().push(reference.to_string());
        Ok(())
    }
}
