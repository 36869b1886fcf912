//! Procedure installation

use super::ProcedureDefinition;
use crate::adapters::database::traits::{DocumentStore, ProcedureInstall};
use crate::domain::{CosmosDbError, Result};
use std::sync::Arc;

/// Installs the data store's procedures into a collection
pub struct StoredProcedureInstaller {
    store: Arc<dyn DocumentStore>,
}

impl StoredProcedureInstaller {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Installs every procedure, skipping ones already in place
    ///
    /// # Returns
    ///
    /// The installed names and whether each was created by this call.
    ///
    /// # Errors
    ///
    /// Returns an error on the first procedure the store rejects.
    pub async fn install_all(&self) -> Result<Vec<(String, ProcedureInstall)>> {
        let mut installed = Vec::new();
        for definition in super::all() {
            installed.push(self.install(&definition).await?);
        }
        Ok(installed)
    }

    async fn install(&self, definition: &ProcedureDefinition) -> Result<(String, ProcedureInstall)> {
        let name = definition.installed_name();

        let outcome = self
            .store
            .install_procedure(&name, definition.body)
            .await
            .map_err(|failure| CosmosDbError::ProcedureInstallFailed {
                name: name.clone(),
                message: failure.to_string(),
            })?;

        match outcome {
            ProcedureInstall::Created => {
                tracing::info!(
                    procedure = %name,
                    collection = %self.store.collection(),
                    "Installed stored procedure"
                );
            }
            ProcedureInstall::AlreadyInstalled => {
                tracing::debug!(procedure = %name, "Stored procedure already installed");
            }
        }

        Ok((name, outcome))
    }
}
