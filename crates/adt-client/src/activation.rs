//! Activation of changed objects

use crate::client::AdtClient;
use crate::xml::{activation_document, parse_activation_messages};
use adt_core::{Accept, ActivationReport, AdtResult, ObjectReference, Severity};
use reqwest::Method;

const ACTIVATION_PATH: &str = "/activation";

impl AdtClient {
    /// Activate one object
    ///
    /// Unreadable response bodies are logged and yield an empty report.
    ///
    /// # Errors
    /// Classified status of a non-2xx response
    pub async fn activate(&self, reference: &ObjectReference) -> AdtResult<ActivationReport> {
        self.require_authenticated()?;
        tracing::info!("activating {}", reference);

        let headers = self
            .write_headers(Accept::Xml)?
            .with("Content-Type", "application/xml");
        let request = self
            .request(Method::POST, ACTIVATION_PATH, headers)
            .with_query("method", "activate")
            .with_query("preauditRequested", "true")
            .with_body(activation_document(reference));

        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(response.into_error(&format!("activation of {reference}")));
        }

        let report = match parse_activation_messages(&response.body) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("activation response for {} not readable: {}", reference, e);
                ActivationReport::default()
            }
        };

        if report.has_errors() {
            let errors = report
                .messages
                .iter()
                .filter(|m| m.severity == Severity::Error)
                .count();
            tracing::warn!("activation of {} reported {} error(s)", reference, errors);
        } else {
            tracing::info!("{} activated", reference);
        }
        Ok(report)
    }
}
