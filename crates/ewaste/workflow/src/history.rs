use crate::coordinator::WorkflowCoordinator;
use crate::error::WorkflowResult;
use ewaste_storage::QueryWindow;
use ewaste_types::{ItemId, Principal, StatusLogEntry};

impl WorkflowCoordinator {
    /// Full status history of an item, newest first. Same visibility rules
    /// as the detail view.
    pub async fn status_history(
        &self,
        principal: &Principal,
        item_id: ItemId,
    ) -> WorkflowResult<Vec<StatusLogEntry>> {
        let item = self.load_item(item_id).await?;
        self.authorize_view(principal, &item).await?;
        Ok(self
            .storage
            .list_status_log(&item_id, QueryWindow::all())
            .await?)
    }
}
