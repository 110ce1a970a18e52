use crate::engine::EngineHandle;
use zbus::interface;

/// D-Bus interface for the artgate verification daemon.
///
/// Bus name: org.artgate.Gate1
/// Object path: /org/artgate/Gate1
pub struct GateService {
    engine: EngineHandle,
}

impl GateService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

#[interface(name = "org.artgate.Gate1")]
impl GateService {
    /// Trigger one verification scan.
    ///
    /// Returns (accepted, similarity, message). Recoverable failures
    /// come back as a rejection with a human-readable message; fatal
    /// session errors (incompatible reference) surface as D-Bus errors.
    async fn scan(&self) -> zbus::fdo::Result<(bool, f64, String)> {
        tracing::info!("scan requested");
        match self.engine.scan().await {
            Ok(outcome) => {
                tracing::info!(
                    accepted = outcome.accepted,
                    similarity = outcome.similarity,
                    state = outcome.state.as_str(),
                    "scan completed"
                );
                Ok((outcome.accepted, outcome.similarity as f64, outcome.message))
            }
            Err(e) => Err(zbus::fdo::Error::Failed(e.to_string())),
        }
    }

    /// Return daemon status as a JSON string.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self
            .engine
            .status()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "state": status.state.as_str(),
            "reference_dims": status.reference_dims,
            "threshold": status.threshold,
            "last_similarity": status.last_similarity,
        })
        .to_string())
    }
}
