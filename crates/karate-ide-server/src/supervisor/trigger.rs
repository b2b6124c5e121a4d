//! HTTP trigger for a persistent Karate test server.

use tracing::debug;

use super::SupervisorError;

/// Ask the test server listening on `port` to run `path`.
///
/// # Errors
///
/// Returns [`SupervisorError::Trigger`] when the server cannot be reached
/// and [`SupervisorError::TriggerStatus`] for any non-2xx response.
pub async fn trigger_run(
    client: &reqwest::Client,
    port: u16,
    path: &str,
) -> Result<(), SupervisorError> {
    let url = format!("http://localhost:{port}/{path}");
    debug!(%url, "triggering test server");
    let response = client.get(&url).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(SupervisorError::TriggerStatus {
        status: status.as_u16(),
        body,
    })
}
