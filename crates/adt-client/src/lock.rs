//! Object lock coordinator
//!
//! Acquires and releases the remote exclusive lock on one object path.
//! The server enforces a single holder per object; local callers are not
//! serialized and a competing holder surfaces as `Conflict(AlreadyLocked)`.

use crate::client::AdtClient;
use crate::transport::RawResponse;
use crate::xml::{parse_lock_response, LOCK_HANDLE_HEADERS};
use adt_core::{Accept, AdtError, AdtResult, ConflictKind, LockHandle, ObjectReference};
use futures::FutureExt;
use reqwest::Method;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Accept type of lock requests
pub const LOCK_ACCEPT: &str =
    "application/vnd.sap.as+xml;charset=UTF-8;dataname=com.sap.adt.lock.result";

/// Content type sent on the single lock retry
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

impl AdtClient {
    /// Lock an object for modification
    ///
    /// A 400 "Content type missing" is retried exactly once with an explicit
    /// form content type.
    ///
    /// # Errors
    /// - `AdtError::Conflict` with `AlreadyLocked` if another session holds it
    /// - `AdtError::Protocol` if the response carries no recognizable handle
    pub async fn lock(&self, reference: &ObjectReference) -> AdtResult<LockHandle> {
        self.require_authenticated()?;
        tracing::debug!("locking {}", reference);

        let mut response = self.send_lock(reference, None).await?;
        if is_content_type_missing(&response) {
            tracing::debug!("retrying lock of {} with explicit content type", reference);
            response = self.send_lock(reference, Some(FORM_CONTENT_TYPE)).await?;
            if is_content_type_missing(&response) {
                return Err(AdtError::protocol_with_raw(
                    format!("lock of {reference} rejected twice: content type missing"),
                    response.body,
                ));
            }
        }

        if response.status != 200 {
            return Err(lock_error(reference, response));
        }

        let handle = match parse_lock_response(&response.body) {
            Ok(handle) => handle,
            Err(parse_error) => LOCK_HANDLE_HEADERS
                .iter()
                .find_map(|name| response.header(name))
                .filter(|token| !token.trim().is_empty())
                .map(|token| LockHandle::new(token.trim()))
                .ok_or(parse_error)?,
        };

        tracing::info!("locked {} ({:?})", reference, handle);
        Ok(handle)
    }

    /// Release a lock; 200 or 204 is success
    ///
    /// # Errors
    /// Transport failure or the classified status
    pub async fn unlock(&self, reference: &ObjectReference, handle: &LockHandle) -> AdtResult<()> {
        tracing::debug!("unlocking {}", reference);
        let request = self
            .request(Method::POST, reference.path(), self.write_headers(Accept::Xml)?)
            .with_query("_action", "UNLOCK")
            .with_query("lockHandle", handle.token())
            .with_empty_body();

        let response = self.send(request).await?;
        match response.status {
            200 | 204 => {
                tracing::debug!("unlocked {}", reference);
                Ok(())
            }
            _ => Err(response.into_error(&format!("unlock of {reference}"))),
        }
    }

    /// Run `body` while holding the lock on `reference`
    ///
    /// Unlock is attempted exactly once after `body` finishes, whether it
    /// succeeded, failed or panicked; a panic resumes after the unlock. A
    /// failed unlock is appended to the body's error, or only logged when
    /// the body succeeded.
    ///
    /// # Errors
    /// The lock failure, or the body's error
    pub async fn with_lock<T, F, Fut>(&self, reference: &ObjectReference, body: F) -> AdtResult<T>
    where
        F: FnOnce(LockHandle) -> Fut,
        Fut: Future<Output = AdtResult<T>>,
    {
        let handle = self.lock(reference).await?;

        let outcome = AssertUnwindSafe(async { body(handle.clone()).await })
            .catch_unwind()
            .await;
        let unlocked = self.unlock(reference, &handle).await;

        match (outcome, unlocked) {
            (Err(panic), unlocked) => {
                if let Err(e) = unlocked {
                    tracing::warn!("unlock of {} failed while unwinding: {}", reference, e);
                }
                std::panic::resume_unwind(panic)
            }
            (Ok(Ok(value)), Ok(())) => Ok(value),
            (Ok(Ok(value)), Err(e)) => {
                tracing::warn!("change to {} applied but unlock failed: {}", reference, e);
                Ok(value)
            }
            (Ok(Err(primary)), Ok(())) => Err(primary),
            (Ok(Err(primary)), Err(e)) => {
                tracing::warn!("unlock of {} failed after error: {}", reference, e);
                Err(primary.with_unlock_failure(e))
            }
        }
    }

    async fn send_lock(
        &self,
        reference: &ObjectReference,
        content_type: Option<&'static str>,
    ) -> AdtResult<RawResponse> {
        let mut headers = self.write_headers(Accept::Vendor(LOCK_ACCEPT))?;
        if let Some(content_type) = content_type {
            headers.insert("Content-Type", content_type);
        }
        let request = self
            .request(Method::POST, reference.path(), headers)
            .with_query("_action", "LOCK")
            .with_query("accessMode", "MODIFY")
            .with_empty_body();
        self.send(request).await
    }
}

fn is_content_type_missing(response: &RawResponse) -> bool {
    response.status == 400 && response.body.to_lowercase().contains("content type missing")
}

fn lock_error(reference: &ObjectReference, response: RawResponse) -> AdtError {
    let body = response.body.to_lowercase();
    let mentions_lock = body.contains("lock") || body.contains("enqueue");
    let held_elsewhere = response.status == 409 || (response.status == 403 && mentions_lock);
    if held_elsewhere {
        return AdtError::conflict(
            ConflictKind::AlreadyLocked,
            reference.name(),
            response.body,
        );
    }
    response.into_error(&format!("lock of {reference}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adt_core::ObjectKind;
    use reqwest::header::HeaderMap;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn content_type_missing_detection() {
        assert!(is_content_type_missing(&response(
            400,
            "<exc:exception>Content type missing</exc:exception>"
        )));
        assert!(!is_content_type_missing(&response(400, "bad request")));
        assert!(!is_content_type_missing(&response(200, "Content type missing")));
    }

    #[test]
    fn foreign_lock_is_conflict() {
        let reference = ObjectKind::Program.reference("ZTEST", None).unwrap();

        let err = lock_error(&reference, response(409, "locked"));
        assert!(err.is_already_locked());

        let err = lock_error(
            &reference,
            response(403, "Object is currently locked by user DEV2 (enqueue)"),
        );
        assert!(err.is_already_locked());

        let err = lock_error(&reference, response(403, "no authorization"));
        assert!(matches!(err, AdtError::Authorization(_)));
    }
}
