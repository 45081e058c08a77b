//! XML extraction
//!
//! The protocol never needs full documents, only a handful of fields:
//! - lock handle and transport number from lock responses
//! - object references from search results
//! - repository nodes from package listings
//! - messages from activation results
//! - facets of an object-properties response
//!
//! Lock responses come in two encodings, so parsing is an ordered list of
//! attempts; the first that yields a handle wins.

use adt_core::{
    ActivationMessage, ActivationReport, AdtError, AdtResult, LockHandle, ObjectInfo,
    ObjectReference, Severity, TransactionInfo,
};
use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

/// Response headers some releases use for the lock handle
pub(crate) const LOCK_HANDLE_HEADERS: [&str; 2] = ["sap-adt-lockhandle", "x-sap-adt-lockhandle"];

static RAW_LOCK_HANDLE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)LOCK_?HANDLE\s*(?:>|=\s*["'])\s*([^<"'\s]+)"#).ok());

static RAW_CORRNR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)CORR_?NR\s*(?:>|=\s*["'])\s*([^<"'\s]+)"#).ok());

type LockParser = fn(&str) -> Option<LockHandle>;

/// Lock response parsers, tried in order
const LOCK_PARSERS: [(&str, LockParser); 3] = [
    ("asx envelope", parse_asx_envelope),
    ("object reference attributes", parse_reference_attributes),
    ("raw marker", parse_raw_marker),
];

/// Extract the lock handle from a lock response body
///
/// # Errors
/// - `AdtError::Protocol` carrying the raw body when no attempt matches
pub fn parse_lock_response(body: &str) -> AdtResult<LockHandle> {
    for (name, parser) in LOCK_PARSERS {
        if let Some(handle) = parser(body) {
            tracing::debug!("lock handle parsed via {}", name);
            return Ok(handle);
        }
    }
    Err(AdtError::protocol_with_raw(
        "no lock handle in lock response",
        body,
    ))
}

/// `asx:abap/asx:values/DATA/{LOCK_HANDLE, CORRNR}`
fn parse_asx_envelope(body: &str) -> Option<LockHandle> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut token = None;
    let mut corrnr = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let inside_data = path.len() >= 2 && path[path.len() - 2] == "DATA";
                if !inside_data || !path.iter().any(|p| p == "values") {
                    continue;
                }
                let Ok(text) = t.unescape() else { continue };
                match path.last().map(String::as_str) {
                    Some("LOCK_HANDLE") => token = Some(text.trim().to_string()),
                    Some("CORRNR") => corrnr = Some(text.trim().to_string()),
                    _ => {}
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    let token = token.filter(|t| !t.is_empty())?;
    let handle = LockHandle::new(token);
    Some(match corrnr {
        Some(nr) => handle.with_transport(nr),
        None => handle,
    })
}

/// Any element carrying `lockHandle` / `corrNr` attributes
fn parse_reference_attributes(body: &str) -> Option<LockHandle> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                let token = attribute(&e, "lockHandle");
                if let Some(token) = token.filter(|t| !t.is_empty()) {
                    let handle = LockHandle::new(token);
                    return Some(match attribute(&e, "corrNr") {
                        Some(nr) => handle.with_transport(nr),
                        None => handle,
                    });
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Last resort: a lock-handle marker anywhere in the payload
fn parse_raw_marker(body: &str) -> Option<LockHandle> {
    let token = RAW_LOCK_HANDLE.as_ref()?.captures(body)?.get(1)?.as_str();
    let handle = LockHandle::new(token);
    let corrnr = RAW_CORRNR
        .as_ref()
        .and_then(|re| re.captures(body))
        .and_then(|c| c.get(1));
    Some(match corrnr {
        Some(nr) => handle.with_transport(nr.as_str()),
        None => handle,
    })
}

/// Object references of a search result
///
/// Elements without a name are skipped.
#[must_use]
pub fn parse_object_references(body: &str) -> Vec<ObjectInfo> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut objects = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e))
                if e.local_name().as_ref() == b"objectReference" =>
            {
                let name = attribute(&e, "name").unwrap_or_default();
                if name.is_empty() {
                    continue;
                }
                objects.push(ObjectInfo {
                    name,
                    object_type: attribute(&e, "type").unwrap_or_default(),
                    description: attribute(&e, "description").unwrap_or_default(),
                    package: attribute(&e, "packageName").unwrap_or_default(),
                    uri: attribute(&e, "uri").unwrap_or_default(),
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("search result truncated by malformed XML: {}", e);
                break;
            }
            _ => {}
        }
    }
    objects
}

/// Repository nodes of a package listing
#[must_use]
pub fn parse_node_structure(body: &str) -> Vec<ObjectInfo> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut objects = Vec::new();
    let mut current: Option<ObjectInfo> = None;
    let mut field: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "SEU_ADT_REPOSITORY_OBJ_NODE" {
                    current = Some(ObjectInfo::default());
                } else if current.is_some() {
                    field = Some(name);
                }
            }
            Ok(Event::Text(t)) => {
                let (Some(node), Some(field)) = (current.as_mut(), field.as_deref()) else {
                    continue;
                };
                let text = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                match field {
                    "OBJECT_TYPE" => node.object_type = text,
                    "OBJECT_NAME" => node.name = text,
                    "OBJECT_URI" => node.uri = text,
                    "DESCRIPTION" => node.description = text,
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"SEU_ADT_REPOSITORY_OBJ_NODE" {
                    if let Some(node) = current.take().filter(|n| !n.name.is_empty()) {
                        objects.push(node);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("package listing truncated by malformed XML: {}", e);
                break;
            }
            _ => {}
        }
    }
    objects
}

/// Facets of a transaction from the object-properties service
///
/// `PACKAGE`, `APPL` and `PROG` facets fill the named fields; every facet
/// lands in `properties`.
#[must_use]
pub fn parse_transaction_properties(code: &str, body: &str) -> TransactionInfo {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    let mut info = TransactionInfo {
        transaction_code: code.to_string(),
        ..TransactionInfo::default()
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.local_name().as_ref() {
                b"object" => {
                    if let Some(text) = attribute(&e, "text") {
                        info.description = text;
                    }
                }
                b"property" => {
                    let Some(facet) = attribute(&e, "facet") else { continue };
                    let value = attribute(&e, "name").unwrap_or_default();
                    match facet.to_ascii_uppercase().as_str() {
                        "PACKAGE" => info.package.clone_from(&value),
                        "APPL" => info.application.clone_from(&value),
                        "PROG" | "PROGRAM" => info.program.clone_from(&value),
                        _ => {}
                    }
                    info.properties.insert(facet.to_ascii_lowercase(), value);
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("transaction properties truncated by malformed XML: {}", e);
                break;
            }
            _ => {}
        }
    }
    info
}

/// Messages of an activation response
///
/// # Errors
/// - `AdtError::Protocol` if the body is not well-formed XML
pub fn parse_activation_messages(body: &str) -> AdtResult<ActivationReport> {
    if body.trim().is_empty() {
        return Ok(ActivationReport::default());
    }

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut report = ActivationReport::default();
    let mut current: Option<ActivationMessage> = None;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"msg" => {
                current = Some(message_from(&e));
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"msg" => {
                report.messages.push(message_from(&e));
            }
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"txt" => in_text = true,
            Ok(Event::Text(t)) if in_text => {
                if let (Some(msg), Ok(text)) = (current.as_mut(), t.unescape()) {
                    if !msg.text.is_empty() {
                        msg.text.push(' ');
                    }
                    msg.text.push_str(text.trim());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"txt" => in_text = false,
                b"msg" => report.messages.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AdtError::protocol_with_raw(
                    format!("malformed activation response: {e}"),
                    body,
                ))
            }
            _ => {}
        }
    }
    Ok(report)
}

fn message_from(e: &BytesStart<'_>) -> ActivationMessage {
    ActivationMessage {
        severity: Severity::from_code(&attribute(e, "type").unwrap_or_default()),
        text: attribute(e, "shortText").unwrap_or_default(),
        location: attribute(e, "href").or_else(|| attribute(e, "objDescr")),
    }
}

/// Activation request naming one object
#[must_use]
pub fn activation_document(reference: &ObjectReference) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<adtcore:objectReferences xmlns:adtcore="http://www.sap.com/adt/core">"#,
            r#"<adtcore:objectReference adtcore:uri="{}" adtcore:name="{}"/>"#,
            r#"</adtcore:objectReferences>"#
        ),
        escape(reference.uri().as_str()),
        escape(reference.name()),
    )
}

/// Escape an attribute value
#[must_use]
pub(crate) fn escape_attr(value: &str) -> String {
    escape(value).into_owned()
}

/// Attribute value by local name, ignoring the prefix
fn attribute(element: &BytesStart<'_>, local: &str) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local.as_bytes())
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
