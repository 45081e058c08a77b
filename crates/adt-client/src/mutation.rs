//! Source mutation workflow
//!
//! lock → PUT source → unlock, then optional activation. The workflow is
//! type-agnostic: it only sees the [`ObjectReference`] produced by the
//! object table.

use crate::client::AdtClient;
use crate::xml::escape_attr;
use adt_core::{
    source_content_type, Accept, AdtError, AdtResult, ConflictKind, CreationTemplate, LockHandle,
    MutationOutcome, NewObject, ObjectKind, ObjectReference,
};
use reqwest::Method;

impl AdtClient {
    /// Replace the main source of an object
    ///
    /// # Errors
    /// - the lock failure, or the PUT failure with any unlock failure appended
    /// - the activation failure; the source change stays committed
    pub async fn set_source(
        &self,
        reference: &ObjectReference,
        source: &str,
        activate: bool,
    ) -> AdtResult<MutationOutcome> {
        self.require_authenticated()?;
        tracing::info!("updating source of {} ({} bytes)", reference, source.len());

        self.with_lock(reference, |handle| self.put_source(reference, source, handle))
            .await?;
        tracing::info!("source of {} updated", reference);

        let activation = if activate {
            Some(self.activate(reference).await?)
        } else {
            None
        };

        Ok(MutationOutcome {
            object: reference.clone(),
            activation,
        })
    }

    /// Update the source of a named object and activate it
    ///
    /// Function modules take their function group as first extra argument.
    ///
    /// # Errors
    /// - `AdtError::InvalidInput` for kinds whose source cannot be changed
    /// - see [`set_source`](Self::set_source)
    pub async fn update_object(
        &self,
        kind: ObjectKind,
        name: &str,
        extra_args: &[String],
        source: &str,
    ) -> AdtResult<MutationOutcome> {
        if !kind.requires_lock() {
            return Err(AdtError::InvalidInput(format!(
                "updating {kind} objects is not supported"
            )));
        }
        let reference = kind.reference(name, extra_args.first().map(String::as_str))?;
        self.set_source(&reference, source, true).await
    }

    /// Create an object, then set its source and activate it
    ///
    /// # Errors
    /// - `AdtError::InvalidInput` for kinds without a creation template
    /// - `AdtError::Conflict` with `AlreadyExists` on 409
    /// - any failure of the follow-up source update
    pub async fn create_object(&self, request: &NewObject) -> AdtResult<MutationOutcome> {
        self.require_authenticated()?;
        let template = request.kind.creation_template().ok_or_else(|| {
            AdtError::InvalidInput(format!("creating {} objects is not supported", request.kind))
        })?;
        let reference = request.kind.reference(&request.name, None)?;
        tracing::info!("creating {} in package {}", reference, request.package);

        let document = creation_document(
            &template,
            &reference,
            request,
            self.profile().username(),
            self.profile().language(),
        );
        let headers = self
            .write_headers(Accept::Vendor(template.content_type))?
            .with("Content-Type", template.content_type);
        let http_request = self
            .request(Method::POST, template.collection, headers)
            .with_body(document);

        let response = self.send(http_request).await?;
        match response.status {
            200 | 201 => tracing::info!("{} created", reference),
            409 => {
                return Err(AdtError::conflict(
                    ConflictKind::AlreadyExists,
                    reference.name(),
                    response.body,
                ))
            }
            _ => return Err(response.into_error(&format!("creation of {reference}"))),
        }

        if request.source.is_empty() {
            let activation = self.activate(&reference).await?;
            return Ok(MutationOutcome {
                object: reference,
                activation: Some(activation),
            });
        }

        self.set_source(&reference, &request.source, true)
            .await
            .map_err(|e| {
                tracing::warn!("{} created but source update failed: {}", reference, e);
                e
            })
    }

    async fn put_source(
        &self,
        reference: &ObjectReference,
        source: &str,
        handle: LockHandle,
    ) -> AdtResult<()> {
        let headers = self
            .write_headers(Accept::PlainText)?
            .with("Content-Type", source_content_type(source));
        let mut request = self
            .request(Method::PUT, &reference.source_path(), headers)
            .with_query("lockHandle", handle.token());
        if let Some(transport) = handle.transport() {
            request = request.with_query("corrNr", transport);
        }

        let response = self.send(request.with_body(source)).await?;
        match response.status {
            200 | 204 => Ok(()),
            _ => {
                tracing::error!(
                    "source update of {} failed: HTTP {}",
                    reference,
                    response.status
                );
                Err(response.into_error(&format!("source update of {reference}")))
            }
        }
    }
}

/// Metadata document posted to the collection
fn creation_document(
    template: &CreationTemplate,
    reference: &ObjectReference,
    request: &NewObject,
    responsible: &str,
    language: &str,
) -> String {
    let prefix = template
        .root_element
        .split_once(':')
        .map_or("", |(prefix, _)| prefix);

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<{root} xmlns:{prefix}="{namespace}" xmlns:adtcore="http://www.sap.com/adt/core" "#,
            r#"adtcore:type="{adt_type}" adtcore:name="{name}" adtcore:description="{description}" "#,
            r#"adtcore:responsible="{responsible}" adtcore:masterLanguage="{language}">"#,
            "\n",
            r#"  <adtcore:packageRef adtcore:name="{package}"/>"#,
            "\n",
            "</{root}>"
        ),
        root = template.root_element,
        prefix = prefix,
        namespace = template.namespace,
        adt_type = reference.kind().adt_type(),
        name = escape_attr(reference.name()),
        description = escape_attr(&request.description),
        responsible = escape_attr(&responsible.to_uppercase()),
        language = escape_attr(language),
        package = escape_attr(&request.package),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_document_shape() {
        let request = NewObject::new(ObjectKind::Program, "zhello")
            .with_description("Hello <world>");
        let reference = request.kind.reference(&request.name, None).unwrap();
        let template = request.kind.creation_template().unwrap();

        let doc = creation_document(&template, &reference, &request, "developer", "EN");

        assert!(doc.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(doc.contains(
            r#"<program:abapProgram xmlns:program="http://www.sap.com/adt/programs/programs""#
        ));
        assert!(doc.contains(r#"adtcore:name="ZHELLO""#));
        assert!(doc.contains(r#"adtcore:description="Hello &lt;world&gt;""#));
        assert!(doc.contains(r#"adtcore:responsible="DEVELOPER""#));
        assert!(doc.contains(r#"<adtcore:packageRef adtcore:name="$TMP"/>"#));
        assert!(doc.trim_end().ends_with("</program:abapProgram>"));
    }
}
