//! Read models and request types

use crate::object::{ObjectKind, ObjectReference};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Package used when the caller names none
pub const DEFAULT_PACKAGE: &str = "$TMP";

/// Lock token returned by a successful lock
///
/// Single-use: presented on the PUT and on the unlock of the same cycle,
/// never cached across cycles.
#[derive(Clone, PartialEq, Eq)]
pub struct LockHandle {
    token: String,
    transport: Option<String>,
}

impl LockHandle {
    /// Create handle from a parsed token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            transport: None,
        }
    }

    /// With transport request number; blank values are dropped
    #[must_use]
    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        let transport = transport.into();
        let transport = transport.trim();
        self.transport = (!transport.is_empty()).then(|| transport.to_string());
        self
    }

    /// Lock token
    #[inline]
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Transport request number, if the object is transportable
    #[inline]
    #[must_use]
    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.token.chars().take(8).collect();
        f.debug_struct("LockHandle")
            .field("token", &format!("{preview}..."))
            .field("transport", &self.transport)
            .finish()
    }
}

/// Source of one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCode {
    /// Upper-cased object name
    pub object_name: String,
    /// Object kind
    pub object_type: ObjectKind,
    /// Source text
    pub source: String,
    /// Version as reported by the server
    pub version: String,
    /// Entity tag of the source
    pub etag: String,
}

/// Object metadata from search and package listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object name
    pub name: String,
    /// Short ADT type code, e.g. `PROG/P`
    #[serde(rename = "type")]
    pub object_type: String,
    /// Short description
    pub description: String,
    /// Owning package
    pub package: String,
    /// Repository URI
    pub uri: String,
}

impl ObjectInfo {
    /// Check if the object matches one of the requested kinds
    ///
    /// An empty filter matches everything.
    #[must_use]
    pub fn matches_any(&self, kinds: &[ObjectKind]) -> bool {
        kinds.is_empty()
            || kinds.iter().any(|kind| {
                let code = kind.adt_type();
                self.object_type.eq_ignore_ascii_case(code)
                    || code
                        .split('/')
                        .next()
                        .is_some_and(|main| self.object_type.eq_ignore_ascii_case(main))
            })
    }
}

/// Result of a quick search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Matching objects
    pub objects: Vec<ObjectInfo>,
    /// Number of objects returned
    pub total: usize,
}

/// Development package with its objects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name
    pub name: String,
    /// Short description
    pub description: String,
    /// Contained objects, empty for plain listings
    pub objects: Vec<ObjectInfo>,
}

/// Kind of dictionary type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    /// Domain with a source body
    Domain,
    /// Data element, metadata document only
    DataElement,
}

/// Dictionary type description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Upper-cased type name
    pub name: String,
    /// Domain or data element
    pub kind: TypeKind,
    /// Source text or metadata document
    pub source: String,
}

/// Transaction code details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Upper-cased transaction code
    pub transaction_code: String,
    /// Short text
    pub description: String,
    /// Owning package
    pub package: String,
    /// Application component
    pub application: String,
    /// Program started by the transaction, when reported
    pub program: String,
    /// Every reported property, keyed by facet
    pub properties: std::collections::BTreeMap<String, String>,
}

/// Column of a data preview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    /// Column name
    pub name: String,
    /// Dictionary data type
    #[serde(default)]
    pub data_type: String,
    /// Length in characters
    #[serde(default)]
    pub length: u32,
    /// Decimal places
    #[serde(default)]
    pub decimals: u32,
}

/// Rows returned by the data-preview service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    /// Table name
    #[serde(default)]
    pub table_name: String,
    /// Number of rows returned
    #[serde(default)]
    pub row_count: usize,
    /// Column descriptions
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    /// Rows keyed by column name
    #[serde(default)]
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Severity of an activation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Warning, activation still succeeded
    Warning,
    /// Error, object stays inactive
    Error,
}

impl Severity {
    /// Map the server's one-letter type code
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "E" | "A" | "X" => Self::Error,
            "W" => Self::Warning,
            _ => Self::Info,
        }
    }
}

/// One message from an activation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationMessage {
    /// Severity
    pub severity: Severity,
    /// Message text
    pub text: String,
    /// Object or source position the message refers to
    pub location: Option<String>,
}

/// Outcome of an activation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    /// Messages in server order
    pub messages: Vec<ActivationMessage>,
}

impl ActivationReport {
    /// Check if any message is an error
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.severity == Severity::Error)
    }
}

/// Request to create a new object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    /// Kind to create
    pub kind: ObjectKind,
    /// Object name
    pub name: String,
    /// Short description
    pub description: String,
    /// Target package
    pub package: String,
    /// Initial source; empty leaves the server default
    pub source: String,
}

impl NewObject {
    /// Create request in the default package
    #[must_use]
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: String::new(),
            package: DEFAULT_PACKAGE.to_string(),
            source: String::new(),
        }
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With package; empty keeps `$TMP`
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        let package = package.into();
        if !package.trim().is_empty() {
            self.package = package.trim().to_uppercase();
        }
        self
    }

    /// With initial source
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Outcome of a source change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// Object that was changed
    pub object: ObjectReference,
    /// Activation result, when activation was requested
    pub activation: Option<ActivationReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_transport_is_dropped() {
        let handle = LockHandle::new("abc").with_transport("  ");
        assert_eq!(handle.transport(), None);

        let handle = LockHandle::new("abc").with_transport("DEVK900123");
        assert_eq!(handle.transport(), Some("DEVK900123"));
    }

    #[test]
    fn type_filter() {
        let info = ObjectInfo {
            name: "ZFOO".into(),
            object_type: "PROG/P".into(),
            ..ObjectInfo::default()
        };
        assert!(info.matches_any(&[]));
        assert!(info.matches_any(&[ObjectKind::Program]));
        assert!(!info.matches_any(&[ObjectKind::Class]));

        let short = ObjectInfo {
            object_type: "CLAS".into(),
            ..ObjectInfo::default()
        };
        assert!(short.matches_any(&[ObjectKind::Class]));
    }

    #[test]
    fn table_data_tolerates_missing_fields() {
        let data: TableData =
            serde_json::from_str(r#"{"table_name":"T000","rows":[{"MANDT":"100"}]}"#).unwrap();
        assert_eq!(data.rows.len(), 1);
        assert!(data.columns.is_empty());
    }

    #[test]
    fn severity_codes() {
        assert_eq!(Severity::from_code("E"), Severity::Error);
        assert_eq!(Severity::from_code("w"), Severity::Warning);
        assert_eq!(Severity::from_code("S"), Severity::Info);
    }

    #[test]
    fn package_defaults() {
        let req = NewObject::new(ObjectKind::Program, "ZNEW").with_package("");
        assert_eq!(req.package, "$TMP");
        let req = req.with_package("zdev");
        assert_eq!(req.package, "ZDEV");
    }
}
