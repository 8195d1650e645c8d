//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::media::LocalMediaStore;
use axum::Router;
use ewaste_storage::memory::InMemoryEwasteStorage;
use ewaste_storage::EwasteStorage;
use ewaste_workflow::{
    IdentityResolver, MediaStore, NoMediaStore, StaticIdentityResolver, WorkflowCoordinator,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// E-waste tracker daemon
pub struct Server {
    config: DaemonConfig,
    coordinator: Arc<WorkflowCoordinator>,
    identity: Arc<dyn IdentityResolver>,
}

impl Server {
    /// Connect storage, seed the catalog and build the credential table.
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = open_storage(&config.storage).await?;

        let media: Arc<dyn MediaStore> = match &config.media.root {
            Some(root) => Arc::new(LocalMediaStore::new(root)),
            None => Arc::new(NoMediaStore),
        };
        let coordinator = Arc::new(WorkflowCoordinator::new(storage, media));

        for entry in &config.catalog.categories {
            coordinator
                .ensure_category(&entry.name, entry.kind, entry.description.clone())
                .await?;
        }
        for entry in &config.catalog.departments {
            coordinator
                .ensure_department(&entry.name, entry.description.clone())
                .await?;
        }

        let resolver = StaticIdentityResolver::from_claims(config.identity.entries())?;
        if resolver.is_empty() {
            tracing::warn!("no credentials configured; every protected endpoint will refuse requests");
        }

        Ok(Self {
            config,
            coordinator,
            identity: Arc::new(resolver),
        })
    }

    pub fn coordinator(&self) -> Arc<WorkflowCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn router(&self) -> Router {
        let state = AppState::new(self.coordinator.clone(), self.identity.clone());
        create_router(state, &self.config.server)
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = self.router();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "ewasted listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("ewasted shutting down");
        Ok(())
    }
}

async fn open_storage(config: &StorageConfig) -> DaemonResult<Arc<dyn EwasteStorage>> {
    match config {
        StorageConfig::Memory => {
            tracing::info!("using in-memory storage");
            Ok(Arc::new(InMemoryEwasteStorage::new()))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
            retry_attempts,
        } => {
            let store = ewaste_storage::postgres::PostgresEwasteStorage::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
                *retry_attempts,
            )
            .await?;
            tracing::info!(max_connections, "using postgres storage");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(DaemonError::Config(
            "postgres storage requested but ewasted was built without the `postgres` feature"
                .to_string(),
        )),
    }
}

/// Resolves on ctrl-c or SIGTERM; in-flight requests are drained by `axum::serve`.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl-c handler must install");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler must install")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!(signal = "ctrl-c", "draining connections");
        }
        _ = terminate => {
            tracing::info!(signal = "SIGTERM", "draining connections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoryEntry, CredentialEntry, DepartmentEntry};
    use ewaste_types::CategoryKind;

    fn seeded_config() -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.catalog.categories.push(CategoryEntry {
            name: "Monitors".into(),
            kind: CategoryKind::Recyclable,
            description: None,
        });
        config.catalog.departments.push(DepartmentEntry {
            name: "Finance".into(),
            description: Some("Accounts and payroll".into()),
        });
        config
    }

    #[tokio::test]
    async fn test_catalog_seeding_is_idempotent() {
        let config = seeded_config();
        let server = Server::new(config.clone()).await.unwrap();
        let coordinator = server.coordinator();
        let first = coordinator.list_categories().await.unwrap();

        // Re-seeding against the same store must not duplicate anything
        for entry in &config.catalog.categories {
            coordinator
                .ensure_category(&entry.name, entry.kind, None)
                .await
                .unwrap();
        }
        assert_eq!(coordinator.list_categories().await.unwrap(), first);
        assert_eq!(coordinator.list_departments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_credentials_fail_startup() {
        let mut config = DaemonConfig::default();
        config.identity.credentials.push(CredentialEntry {
            token: "bad".into(),
            subject: uuid_subject(),
            role: Some("user".into()),
            kind: Some("vendor".into()),
            department: None,
            vendor: None,
        });
        let err = Server::new(config).await.err().unwrap();
        assert!(matches!(err, DaemonError::Identity(_)));
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_postgres_requires_feature() {
        let mut config = DaemonConfig::default();
        config.storage = StorageConfig::Postgres {
            url: "postgres://localhost/ewaste".into(),
            max_connections: 1,
            connect_timeout_secs: 1,
            retry_attempts: 0,
        };
        assert!(matches!(
            Server::new(config).await.err().unwrap(),
            DaemonError::Config(_)
        ));
    }

    fn uuid_subject() -> String {
        ewaste_types::PrincipalId::generate().to_string()
    }
}
