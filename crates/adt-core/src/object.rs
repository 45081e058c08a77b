//! Declarative object table
//!
//! Each [`ObjectKind`] maps to:
//! - a repository path template
//! - the source sub-path
//! - the short ADT type code used by search results
//! - whether mutation requires the lock workflow
//! - an optional creation template (collection, root element, content type)
//!
//! The mutation workflow itself never matches on the kind; it only sees the
//! [`ObjectReference`] derived from this table.

use crate::error::{AdtError, AdtResult};
use crate::profile::ADT_ROOT_PATH;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sub-path holding the main source of an object
pub const SOURCE_SUBPATH: &str = "/source/main";

/// Content type for plain source bodies
pub const TEXT_SOURCE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Content type for payloads starting with an XML prolog
pub const XML_SOURCE_CONTENT_TYPE: &str = "application/xml";

/// Kind of repository object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    /// Executable program (report)
    Program,
    /// Global class
    Class,
    /// Function group
    FunctionGroup,
    /// Function module, addressed through its group
    FunctionModule,
    /// Program include
    Include,
    /// Global interface
    Interface,
    /// Dictionary structure
    Structure,
    /// Dictionary table
    Table,
    /// Dictionary domain
    Domain,
    /// Dictionary data element
    DataElement,
    /// Development package
    Package,
}

/// How to create an object of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationTemplate {
    /// Collection the metadata document is posted to
    pub collection: &'static str,
    /// Qualified root element of the metadata document
    pub root_element: &'static str,
    /// Namespace bound to the root element's prefix
    pub namespace: &'static str,
    /// Vendor content type of the metadata document
    pub content_type: &'static str,
}

impl ObjectKind {
    /// Every kind in table order
    pub const ALL: [ObjectKind; 11] = [
        Self::Program,
        Self::Class,
        Self::FunctionGroup,
        Self::FunctionModule,
        Self::Include,
        Self::Interface,
        Self::Structure,
        Self::Table,
        Self::Domain,
        Self::DataElement,
        Self::Package,
    ];

    /// Canonical upper-case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Program => "PROGRAM",
            Self::Class => "CLASS",
            Self::FunctionGroup => "FUNCTION_GROUP",
            Self::FunctionModule => "FUNCTION",
            Self::Include => "INCLUDE",
            Self::Interface => "INTERFACE",
            Self::Structure => "STRUCTURE",
            Self::Table => "TABLE",
            Self::Domain => "DOMAIN",
            Self::DataElement => "DATA_ELEMENT",
            Self::Package => "PACKAGE",
        }
    }

    /// Short ADT type code as it appears in search results
    #[must_use]
    pub fn adt_type(&self) -> &'static str {
        match self {
            Self::Program => "PROG/P",
            Self::Class => "CLAS/OC",
            Self::FunctionGroup => "FUGR/F",
            Self::FunctionModule => "FUGR/FF",
            Self::Include => "PROG/I",
            Self::Interface => "INTF/OI",
            Self::Structure => "TABL/DS",
            Self::Table => "TABL/DT",
            Self::Domain => "DOMA/DD",
            Self::DataElement => "DTEL/DE",
            Self::Package => "DEVC/K",
        }
    }

    /// Collection path below the ADT root
    fn collection(&self) -> &'static str {
        match self {
            Self::Program => "/programs/programs",
            Self::Class => "/oo/classes",
            Self::FunctionGroup | Self::FunctionModule => "/functions/groups",
            Self::Include => "/programs/includes",
            Self::Interface => "/oo/interfaces",
            Self::Structure => "/ddic/structures",
            Self::Table => "/ddic/tables",
            Self::Domain => "/ddic/domains",
            Self::DataElement => "/ddic/dataelements",
            Self::Package => "/packages",
        }
    }

    /// Whether the object has a `source/main` body
    #[must_use]
    pub fn has_source(&self) -> bool {
        !matches!(self, Self::DataElement | Self::Package)
    }

    /// Whether changing the source goes through lock / unlock
    #[must_use]
    pub fn requires_lock(&self) -> bool {
        matches!(
            self,
            Self::Program | Self::Class | Self::Include | Self::Interface | Self::FunctionModule
        )
    }

    /// Whether the kind needs a parent name (function group)
    #[must_use]
    pub fn requires_parent(&self) -> bool {
        matches!(self, Self::FunctionModule)
    }

    /// Creation template, if the kind can be created
    #[must_use]
    pub fn creation_template(&self) -> Option<CreationTemplate> {
        let template = match self {
            Self::Program => CreationTemplate {
                collection: "/programs/programs",
                root_element: "program:abapProgram",
                namespace: "http://www.sap.com/adt/programs/programs",
                content_type: "application/vnd.sap.adt.programs.programs.v2+xml",
            },
            Self::Class => CreationTemplate {
                collection: "/oo/classes",
                root_element: "class:abapClass",
                namespace: "http://www.sap.com/adt/oo/classes",
                content_type: "application/vnd.sap.adt.oo.classes.v4+xml",
            },
            Self::Interface => CreationTemplate {
                collection: "/oo/interfaces",
                root_element: "intf:abapInterface",
                namespace: "http://www.sap.com/adt/oo/interfaces",
                content_type: "application/vnd.sap.adt.oo.interfaces.v5+xml",
            },
            Self::Include => CreationTemplate {
                collection: "/programs/includes",
                root_element: "include:abapInclude",
                namespace: "http://www.sap.com/adt/programs/includes",
                content_type: "application/vnd.sap.adt.programs.includes.v2+xml",
            },
            _ => return None,
        };
        Some(template)
    }

    /// Build the reference for a named object
    ///
    /// # Errors
    /// - `AdtError::InvalidInput` for empty names, names with path
    ///   separators, or a function module without its group
    pub fn reference(&self, name: &str, parent: Option<&str>) -> AdtResult<ObjectReference> {
        let name = canonical_name(name)?;
        let path = if self.requires_parent() {
            let group = parent
                .map(canonical_name)
                .transpose()?
                .ok_or_else(|| {
                    AdtError::InvalidInput(format!(
                        "function group required for function module {name}"
                    ))
                })?;
            format!("{}/{group}/fmodules/{name}", self.collection())
        } else {
            format!("{}/{name}", self.collection())
        };

        Ok(ObjectReference {
            kind: *self,
            path,
            name,
        })
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = AdtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_uppercase().as_str() {
            "PROGRAM" | "PROG" | "REPORT" => Self::Program,
            "CLASS" | "CLAS" => Self::Class,
            "FUNCTION" | "FUNC" | "FUGR" => Self::FunctionModule,
            "FUNCTION_GROUP" | "FUNCTIONGROUP" => Self::FunctionGroup,
            "INCLUDE" | "INCL" => Self::Include,
            "INTERFACE" | "INTF" => Self::Interface,
            "STRUCTURE" | "STRU" | "TTYP" => Self::Structure,
            "TABLE" | "TABL" | "DDIC" => Self::Table,
            "DOMAIN" | "DOMA" => Self::Domain,
            "DATA_ELEMENT" | "DATAELEMENT" | "DTEL" => Self::DataElement,
            "PACKAGE" | "PACK" | "DEVC" => Self::Package,
            other => {
                return Err(AdtError::InvalidInput(format!(
                    "unsupported object type: {other}"
                )))
            }
        };
        Ok(kind)
    }
}

/// Addressing unit for lock, unlock, source and activation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    kind: ObjectKind,
    path: String,
    name: String,
}

impl ObjectReference {
    /// Object kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Repository path below the ADT root, e.g. `/programs/programs/ZFOO`
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Upper-cased display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the main source
    #[must_use]
    pub fn source_path(&self) -> String {
        format!("{}{SOURCE_SUBPATH}", self.path)
    }

    /// Canonical URI as used inside activation documents
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{ADT_ROOT_PATH}{}", self.path)
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// Content type for a source payload
#[must_use]
pub fn source_content_type(source: &str) -> &'static str {
    if source.trim_start().starts_with("<?xml") {
        XML_SOURCE_CONTENT_TYPE
    } else {
        TEXT_SOURCE_CONTENT_TYPE
    }
}

fn canonical_name(name: &str) -> AdtResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AdtError::InvalidInput("object name is empty".to_string()));
    }
    if name.contains(['?', '#', '&', ' ']) || (name.contains('/') && !name.starts_with('/')) {
        return Err(AdtError::InvalidInput(format!(
            "object name contains reserved characters: {name}"
        )));
    }
    // Namespaced names like /ABC/ZFOO are sent escaped.
    Ok(name.to_uppercase().replace('/', "%2F"))
}
