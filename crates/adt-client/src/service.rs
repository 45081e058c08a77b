//! Capability surface consumed by front ends
//!
//! Command handlers depend on [`AdtService`] rather than on [`AdtClient`],
//! so they can be exercised against a mock.

use crate::client::AdtClient;
use adt_core::{
    AdtResult, MutationOutcome, NewObject, ObjectKind, PackageInfo, SearchResult, SourceCode,
    TableData, TransactionInfo, TypeInfo,
};
use async_trait::async_trait;

/// Operations offered by an authenticated connection
#[async_trait]
pub trait AdtService: Send + Sync {
    /// Source of an object; function modules take their group as first extra argument
    async fn get_object(
        &self,
        kind: ObjectKind,
        name: &str,
        extra_args: &[String],
    ) -> AdtResult<SourceCode>;

    /// Quick search with optional client-side type filter
    async fn search_objects(&self, pattern: &str, kinds: &[ObjectKind]) -> AdtResult<SearchResult>;

    /// Packages matching a pattern
    async fn list_packages(&self, pattern: &str) -> AdtResult<Vec<PackageInfo>>;

    /// Objects in one package
    async fn get_package_contents(&self, name: &str) -> AdtResult<PackageInfo>;

    /// Create, fill and activate a new object
    async fn create_object(&self, request: &NewObject) -> AdtResult<MutationOutcome>;

    /// Replace the source of an existing object and activate it
    async fn update_object(
        &self,
        kind: ObjectKind,
        name: &str,
        extra_args: &[String],
        source: &str,
    ) -> AdtResult<MutationOutcome>;

    /// Domain or data element description
    async fn get_type_info(&self, name: &str) -> AdtResult<TypeInfo>;

    /// Rows from the data-preview service
    async fn get_table_contents(&self, table: &str, max_rows: usize) -> AdtResult<TableData>;

    /// Package and application component of a transaction code
    async fn get_transaction(&self, code: &str) -> AdtResult<TransactionInfo>;

    /// Full handshake against the system
    async fn test_connection(&self) -> AdtResult<()>;

    /// Lightweight liveness probe
    async fn ping(&self) -> AdtResult<()>;

    /// Whether the handshake completed
    fn is_authenticated(&self) -> bool;
}

#[async_trait]
impl AdtService for AdtClient {
    async fn get_object(
        &self,
        kind: ObjectKind,
        name: &str,
        extra_args: &[String],
    ) -> AdtResult<SourceCode> {
        self.get_source(kind, name, extra_args).await
    }

    async fn search_objects(&self, pattern: &str, kinds: &[ObjectKind]) -> AdtResult<SearchResult> {
        AdtClient::search_objects(self, pattern, kinds).await
    }

    async fn list_packages(&self, pattern: &str) -> AdtResult<Vec<PackageInfo>> {
        AdtClient::list_packages(self, pattern).await
    }

    async fn get_package_contents(&self, name: &str) -> AdtResult<PackageInfo> {
        AdtClient::get_package_contents(self, name).await
    }

    async fn create_object(&self, request: &NewObject) -> AdtResult<MutationOutcome> {
        AdtClient::create_object(self, request).await
    }

    async fn update_object(
        &self,
        kind: ObjectKind,
        name: &str,
        extra_args: &[String],
        source: &str,
    ) -> AdtResult<MutationOutcome> {
        AdtClient::update_object(self, kind, name, extra_args, source).await
    }

    async fn get_type_info(&self, name: &str) -> AdtResult<TypeInfo> {
        AdtClient::get_type_info(self, name).await
    }

    async fn get_table_contents(&self, table: &str, max_rows: usize) -> AdtResult<TableData> {
        AdtClient::get_table_contents(self, table, max_rows).await
    }

    async fn get_transaction(&self, code: &str) -> AdtResult<TransactionInfo> {
        AdtClient::get_transaction(self, code).await
    }

    async fn test_connection(&self) -> AdtResult<()> {
        AdtClient::test_connection(self).await
    }

    async fn ping(&self) -> AdtResult<()> {
        AdtClient::ping(self).await
    }

    fn is_authenticated(&self) -> bool {
        AdtClient::is_authenticated(self)
    }
}
