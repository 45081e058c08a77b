//! Command handlers
//!
//! Each handler drives one [`AdtService`] operation and returns a
//! [`CommandOutput`] for rendering.

use adt_client::AdtService;
use adt_core::{
    AdtError, MutationOutcome, NewObject, ObjectKind, PackageInfo, SearchResult, SourceCode,
    TableData, TransactionInfo, TypeInfo,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;

/// Result of one command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    /// Handshake succeeded
    Connected {
        /// Host that answered
        host: String,
        /// Logon user
        username: String,
        /// SAP client
        client: String,
    },
    /// Object source
    Source(SourceCode),
    /// Search hits
    Search(SearchResult),
    /// Package listing
    Packages(Vec<PackageInfo>),
    /// Package contents
    Package(PackageInfo),
    /// Created or updated object
    Mutation(MutationOutcome),
    /// Dictionary type
    Type(TypeInfo),
    /// Table rows
    Table(TableData),
    /// Transaction code details
    Transaction(TransactionInfo),
}

impl CommandOutput {
    /// Whether the command succeeded remotely but reported errors
    #[must_use]
    pub fn has_errors(&self) -> bool {
        match self {
            Self::Mutation(outcome) => outcome
                .activation
                .as_ref()
                .is_some_and(adt_core::ActivationReport::has_errors),
            _ => false,
        }
    }
}

/// Report the target of a connection whose handshake already ran
///
/// # Errors
/// - `AdtError::NotAuthenticated` if the service holds no session
pub fn connect(
    service: &dyn AdtService,
    host: &str,
    username: &str,
    client: &str,
) -> Result<CommandOutput> {
    if !service.is_authenticated() {
        return Err(AdtError::NotAuthenticated)
            .with_context(|| format!("connection to {host} has no session"));
    }
    Ok(CommandOutput::Connected {
        host: host.to_string(),
        username: username.to_string(),
        client: client.to_string(),
    })
}

pub async fn get(
    service: &dyn AdtService,
    kind: ObjectKind,
    name: &str,
    args: &[String],
) -> Result<CommandOutput> {
    let source = service
        .get_object(kind, name, args)
        .await
        .with_context(|| format!("cannot read {kind} {name}"))?;
    Ok(CommandOutput::Source(source))
}

pub async fn search(
    service: &dyn AdtService,
    pattern: &str,
    kinds: &[ObjectKind],
) -> Result<CommandOutput> {
    let result = service
        .search_objects(pattern, kinds)
        .await
        .with_context(|| format!("search for {pattern:?} failed"))?;
    Ok(CommandOutput::Search(result))
}

pub async fn packages(service: &dyn AdtService, pattern: Option<&str>) -> Result<CommandOutput> {
    let packages = service
        .list_packages(pattern.unwrap_or_default())
        .await
        .context("package listing failed")?;
    Ok(CommandOutput::Packages(packages))
}

pub async fn package(service: &dyn AdtService, name: &str) -> Result<CommandOutput> {
    let package = service
        .get_package_contents(name)
        .await
        .with_context(|| format!("cannot list package {name}"))?;
    Ok(CommandOutput::Package(package))
}

pub async fn create(service: &dyn AdtService, request: &NewObject) -> Result<CommandOutput> {
    let outcome = service
        .create_object(request)
        .await
        .with_context(|| format!("cannot create {} {}", request.kind, request.name))?;
    Ok(CommandOutput::Mutation(outcome))
}

pub async fn update(
    service: &dyn AdtService,
    kind: ObjectKind,
    name: &str,
    args: &[String],
    source: &str,
) -> Result<CommandOutput> {
    let outcome = service
        .update_object(kind, name, args, source)
        .await
        .with_context(|| format!("cannot update {kind} {name}"))?;
    Ok(CommandOutput::Mutation(outcome))
}

pub async fn type_info(service: &dyn AdtService, name: &str) -> Result<CommandOutput> {
    let info = service
        .get_type_info(name)
        .await
        .with_context(|| format!("cannot describe type {name}"))?;
    Ok(CommandOutput::Type(info))
}

pub async fn preview(
    service: &dyn AdtService,
    table: &str,
    max_rows: usize,
) -> Result<CommandOutput> {
    let data = service
        .get_table_contents(table, max_rows)
        .await
        .with_context(|| format!("cannot preview table {table}"))?;
    Ok(CommandOutput::Table(data))
}

pub async fn transaction(service: &dyn AdtService, code: &str) -> Result<CommandOutput> {
    let info = service
        .get_transaction(code)
        .await
        .with_context(|| format!("cannot read transaction {code}"))?;
    Ok(CommandOutput::Transaction(info))
}

/// Read source text from a file, or stdin for `-`
///
/// # Errors
/// I/O failures, with the path as context
pub fn read_source(location: &str) -> Result<String> {
    if location == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("cannot read source from stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(location).with_context(|| format!("cannot read source file {location}"))
}
