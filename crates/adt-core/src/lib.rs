//! ADT Core - shared vocabulary of the workbench client
//!
//! Everything the protocol engine and its callers agree on:
//! - Connection profiles and their cache fingerprint
//! - The authenticated session and the header contract
//! - The declarative object table and object references
//! - Read models and the error taxonomy
//!
//! No I/O happens in this crate.
//!
//! # Example
//!
//! ```rust
//! use adt_core::{ConnectionProfile, ObjectKind, Secret};
//!
//! let profile = ConnectionProfile::new("erp.local:8000", "DEVELOPER", Secret::new("pw"));
//! assert_eq!(profile.base_url(), "http://erp.local:8000/sap/bc/adt");
//!
//! let reference = ObjectKind::Program.reference("zhello", None).unwrap();
//! assert_eq!(reference.source_path(), "/programs/programs/ZHELLO/source/main");
//! ```

pub mod error;
pub mod object;
pub mod profile;
pub mod session;
pub mod types;

pub use error::{AdtError, AdtResult, ConflictKind, ConnectivityKind};
pub use object::{source_content_type, CreationTemplate, ObjectKind, ObjectReference};
pub use profile::{ConnectionProfile, Fingerprint, Secret};
pub use session::{Accept, RequestHeaders, Session, SessionMode};
pub use types::{
    ActivationMessage, ActivationReport, LockHandle, MutationOutcome, NewObject, ObjectInfo,
    PackageInfo, SearchResult, Severity, SourceCode, TableColumn, TableData, TransactionInfo,
    TypeInfo, TypeKind, DEFAULT_PACKAGE,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with ADT Core
    pub use crate::{
        AdtError, AdtResult, ConnectionProfile, LockHandle, ObjectKind, ObjectReference, Secret,
        Session, SourceCode,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
