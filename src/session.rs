//! One interactive session: the supervised service, its client and the store.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::bootstrap::AppSettings;
use crate::learning_base::{self, LearningBaseStore, ParseError, StoreError, StoredBasePaths};
use crate::output;
use crate::service::rpc::InvalidAddress;
use crate::service::{RpcClient, Supervisor, TransportError};

/// Failures of session-level operations, reported to the user with their cause.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid learning base description: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The service did not pass its health check.
    #[error("Server is not available")]
    ServiceUnavailable,
    /// No dataset is stored under this name.
    #[error("Unknown learning base '{name}'")]
    UnknownBase { name: String },
    /// The prediction succeeded but its result could not be saved.
    #[error("Failed to save prediction to {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Application state owned by the menu loop.
pub struct Session {
    settings: AppSettings,
    supervisor: Supervisor<RpcClient>,
    store: LearningBaseStore,
}

impl Session {
    /// Build a session; `service_log` receives the service's console output.
    pub fn new(settings: AppSettings, service_log: Option<PathBuf>) -> Result<Self, InvalidAddress> {
        let client = RpcClient::new(&settings.address, settings.timeouts)?;
        let supervisor = Supervisor::new(
            settings.service_command(service_log),
            client,
            settings.readiness,
        )
        .with_soft_stop_grace(settings.soft_stop_grace);
        let store = LearningBaseStore::new(settings.data_root.clone());
        Ok(Self {
            settings,
            supervisor,
            store,
        })
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn supervisor(&self) -> &Supervisor<RpcClient> {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut Supervisor<RpcClient> {
        &mut self.supervisor
    }

    pub fn store(&self) -> &LearningBaseStore {
        &self.store
    }

    pub fn client(&self) -> &RpcClient {
        self.supervisor.endpoint()
    }

    /// Parse `description` and store `source` under the parsed name.
    pub fn upload(&self, source: &Path, description: &str) -> Result<StoredBasePaths, SessionError> {
        let config = learning_base::parse(description)?;
        Ok(self.store.upload(source, &config)?)
    }

    /// Train `model_type` on a stored learning base.
    pub fn train(&self, base_name: &str, model_type: &str) -> Result<String, SessionError> {
        self.ensure_available()?;
        let paths = self.stored_paths(base_name)?;
        let response = self.client().train(
            base_name,
            &paths.artifact.to_string_lossy(),
            &paths.config.to_string_lossy(),
            model_type,
        )?;
        info!("Training response for '{base_name}': {response}");
        Ok(response)
    }

    /// Run a prediction and save the response to the configured output file.
    pub fn predict(
        &self,
        file_path: &str,
        model_name: &str,
        base_name: Option<&str>,
    ) -> Result<String, SessionError> {
        self.ensure_available()?;
        let response = self.client().predict(file_path, model_name, base_name)?;
        let path = &self.settings.output_file;
        output::save_prediction(path, &response).map_err(|source| SessionError::Output {
            path: path.clone(),
            source,
        })?;
        info!("Prediction saved to {}", path.display());
        Ok(response)
    }

    fn ensure_available(&self) -> Result<(), SessionError> {
        if self.client().health_check() {
            Ok(())
        } else {
            warn!("Request refused: service health check failed");
            Err(SessionError::ServiceUnavailable)
        }
    }

    fn stored_paths(&self, name: &str) -> Result<StoredBasePaths, SessionError> {
        let paths = self.store.resolve(name);
        if paths.artifact.is_file() && paths.config.is_file() {
            Ok(paths)
        } else {
            Err(SessionError::UnknownBase {
                name: name.to_string(),
            })
        }
    }
}
