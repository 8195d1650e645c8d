//! Reference data registration. Not role-gated; the daemon registers its
//! configured catalog at startup.

use crate::coordinator::WorkflowCoordinator;
use crate::error::{WorkflowError, WorkflowResult};
use ewaste_storage::StorageError;
use ewaste_types::{Category, CategoryKind, Department};
use tracing::{debug, info};

impl WorkflowCoordinator {
    pub async fn register_category(&self, category: Category) -> WorkflowResult<Category> {
        if category.name.trim().is_empty() {
            return Err(WorkflowError::Validation("category name is required".to_string()));
        }
        self.storage.insert_category(category.clone()).await?;
        info!(category_id = %category.id, name = %category.name, kind = category.kind.as_str(), "category registered");
        Ok(category)
    }

    pub async fn register_department(&self, department: Department) -> WorkflowResult<Department> {
        if department.name.trim().is_empty() {
            return Err(WorkflowError::Validation("department name is required".to_string()));
        }
        self.storage.insert_department(department.clone()).await?;
        info!(department_id = %department.id, name = %department.name, "department registered");
        Ok(department)
    }

    /// Return the category with this name, registering it if absent.
    pub async fn ensure_category(
        &self,
        name: &str,
        kind: CategoryKind,
        description: Option<String>,
    ) -> WorkflowResult<Category> {
        if let Some(existing) = self.find_category(name).await? {
            debug!(category_id = %existing.id, name, "category already registered");
            return Ok(existing);
        }
        let mut category = Category::new(name.trim(), kind);
        category.description = description;
        match self.storage.insert_category(category.clone()).await {
            Ok(()) => {
                info!(category_id = %category.id, name, "category registered");
                Ok(category)
            }
            // Registered concurrently under the same name.
            Err(StorageError::Conflict(_)) => self
                .find_category(name)
                .await?
                .ok_or_else(|| WorkflowError::Conflict(format!("category '{name}' is contended"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the department with this name, registering it if absent.
    pub async fn ensure_department(
        &self,
        name: &str,
        description: Option<String>,
    ) -> WorkflowResult<Department> {
        if let Some(existing) = self.find_department(name).await? {
            debug!(department_id = %existing.id, name, "department already registered");
            return Ok(existing);
        }
        let mut department = Department::new(name.trim());
        department.description = description;
        match self.storage.insert_department(department.clone()).await {
            Ok(()) => {
                info!(department_id = %department.id, name, "department registered");
                Ok(department)
            }
            Err(StorageError::Conflict(_)) => self
                .find_department(name)
                .await?
                .ok_or_else(|| WorkflowError::Conflict(format!("department '{name}' is contended"))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_categories(&self) -> WorkflowResult<Vec<Category>> {
        Ok(self.storage.list_categories().await?)
    }

    pub async fn list_departments(&self) -> WorkflowResult<Vec<Department>> {
        Ok(self.storage.list_departments().await?)
    }

    async fn find_category(&self, name: &str) -> WorkflowResult<Option<Category>> {
        let name = name.trim();
        Ok(self
            .storage
            .list_categories()
            .await?
            .into_iter()
            .find(|c| c.name == name))
    }

    async fn find_department(&self, name: &str) -> WorkflowResult<Option<Department>> {
        let name = name.trim();
        Ok(self
            .storage
            .list_departments()
            .await?
            .into_iter()
            .find(|d| d.name == name))
    }
}
