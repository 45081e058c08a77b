//! Authenticated ADT client
//!
//! Owns one profile, one transport and the session produced by the
//! latest handshake. Read operations live here; locking, mutation and activation
//! extend this type from their own modules.

use crate::auth::Authenticator;
use crate::transport::{OutboundRequest, RawResponse, Transport};
use crate::xml;
use adt_core::{
    Accept, AdtError, AdtResult, ConnectionProfile, ObjectInfo, ObjectKind, PackageInfo,
    RequestHeaders, SearchResult, Session, SourceCode, TableData, TransactionInfo, TypeInfo,
    TypeKind,
};
use parking_lot::RwLock;
use reqwest::Method;
use std::time::Duration;

/// Timeout of the liveness probe
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Results requested from quick search
pub const MAX_SEARCH_RESULTS: usize = 100;

/// Rows requested from the data preview when the caller asks for zero
pub const DEFAULT_MAX_ROWS: usize = 100;

const SEARCH_PATH: &str = "/repository/informationsystem/search";
const NODE_STRUCTURE_PATH: &str = "/repository/nodestructure";
const TABLE_CONTENTS_PATH: &str = "/z_mcp_abap_adt/z_tablecontent";
const OBJECT_PROPERTIES_PATH: &str = "/repository/informationsystem/objectproperties/values";
const TRANSACTION_URI_PREFIX: &str = "/sap/bc/adt/vit/wb/object_type/trant/object_name/";

/// Client bound to one system and user
#[derive(Debug)]
pub struct AdtClient {
    profile: ConnectionProfile,
    transport: Transport,
    session: RwLock<Session>,
}

impl AdtClient {
    /// Create unauthenticated client
    ///
    /// # Errors
    /// - `AdtError::Config` if the profile is incomplete
    pub fn new(profile: ConnectionProfile) -> AdtResult<Self> {
        profile.validate()?;
        let transport = Transport::new(&profile)?;
        let session = Session::pending(profile.base_url());
        Ok(Self {
            profile,
            transport,
            session: RwLock::new(session),
        })
    }

    /// Create client and run the handshake
    ///
    /// # Errors
    /// Any handshake failure, see [`Authenticator::authenticate`]
    pub async fn connect(profile: ConnectionProfile) -> AdtResult<Self> {
        let client = Self::new(profile)?;
        client.authenticate().await?;
        Ok(client)
    }

    /// Run the handshake and replace the session
    ///
    /// # Errors
    /// Any handshake failure; the previous session is kept on error
    pub async fn authenticate(&self) -> AdtResult<()> {
        let session = Authenticator::new(&self.profile, &self.transport)
            .authenticate()
            .await?;
        *self.session.write() = session;
        Ok(())
    }

    /// Whether the handshake completed
    #[inline]
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_authenticated()
    }

    /// Connection profile
    #[inline]
    #[must_use]
    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    /// Snapshot of the current session
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Re-run the full handshake and install the fresh session
    ///
    /// # Errors
    /// Any handshake failure; the previous session is kept on error
    pub async fn test_connection(&self) -> AdtResult<()> {
        tracing::info!("testing connection to {}", self.profile.host());
        self.authenticate().await?;
        tracing::info!("connection test passed");
        Ok(())
    }

    /// HEAD `/discovery` with full headers and a short timeout
    ///
    /// # Errors
    /// - `AdtError::NotAuthenticated` before the handshake
    /// - any transport failure or a status other than 200/304
    pub async fn ping(&self) -> AdtResult<()> {
        self.require_authenticated()?;
        let request = self
            .request(Method::HEAD, "/discovery", self.read_headers(Accept::Any))
            .with_timeout(PING_TIMEOUT);
        let response = self.transport.send(request).await?;
        if response.is_ok_or_not_modified() {
            Ok(())
        } else {
            Err(response.into_error("ping"))
        }
    }

    /// Main source of an object
    ///
    /// Function modules take their function group as first extra argument.
    ///
    /// # Errors
    /// - `AdtError::InvalidInput` for kinds without a source body
    /// - `AdtError::NotFound` if the object does not exist
    pub async fn get_source(
        &self,
        kind: ObjectKind,
        name: &str,
        extra_args: &[String],
    ) -> AdtResult<SourceCode> {
        self.require_authenticated()?;
        if !kind.has_source() {
            return Err(AdtError::InvalidInput(format!(
                "{kind} has no source; use the dedicated listing instead"
            )));
        }

        let reference = kind.reference(name, extra_args.first().map(String::as_str))?;
        tracing::info!("retrieving {}", reference);

        let response = self
            .get(&reference.source_path(), Accept::PlainText)
            .await?;
        if response.status != 200 {
            return Err(response.into_error(&reference.to_string()));
        }

        let etag = response.header("etag").unwrap_or_default().to_string();
        tracing::info!("retrieved {} ({} bytes)", reference, response.body.len());

        Ok(SourceCode {
            object_name: reference.name().to_string(),
            object_type: kind,
            source: response.body,
            version: etag.clone(),
            etag,
        })
    }

    /// Quick search; the pattern gets a trailing `*`
    ///
    /// # Errors
    /// Classified status of a failed search
    pub async fn search_objects(
        &self,
        pattern: &str,
        kinds: &[ObjectKind],
    ) -> AdtResult<SearchResult> {
        self.require_authenticated()?;
        tracing::info!("searching objects: {} {:?}", pattern, kinds);

        let query = format!("{}*", pattern.trim().trim_end_matches('*'));
        let request = self
            .request(Method::GET, SEARCH_PATH, self.read_headers(Accept::Xml))
            .with_query("operation", "quickSearch")
            .with_query("query", query)
            .with_query("maxResults", MAX_SEARCH_RESULTS.to_string());

        let response = self.transport.send(request).await?;
        if response.status != 200 {
            return Err(response.into_error("search"));
        }

        let objects: Vec<ObjectInfo> = xml::parse_object_references(&response.body)
            .into_iter()
            .filter(|o| o.matches_any(kinds))
            .collect();

        tracing::info!("search returned {} objects", objects.len());
        Ok(SearchResult {
            total: objects.len(),
            objects,
        })
    }

    /// Packages matching a pattern; empty means `*`
    ///
    /// # Errors
    /// Classified status of a failed search
    pub async fn list_packages(&self, pattern: &str) -> AdtResult<Vec<PackageInfo>> {
        self.require_authenticated()?;
        let pattern = match pattern.trim() {
            "" => "*",
            p => p,
        };
        tracing::info!("listing packages: {}", pattern);

        let request = self
            .request(Method::GET, SEARCH_PATH, self.read_headers(Accept::Xml))
            .with_query("operation", "quickSearch")
            .with_query("query", pattern)
            .with_query("objectType", ObjectKind::Package.adt_type())
            .with_query("maxResults", MAX_SEARCH_RESULTS.to_string());

        let response = self.transport.send(request).await?;
        if response.status != 200 {
            return Err(response.into_error("package search"));
        }

        let packages: Vec<PackageInfo> = xml::parse_object_references(&response.body)
            .into_iter()
            .map(|o| PackageInfo {
                name: o.name,
                description: o.description,
                objects: Vec::new(),
            })
            .collect();

        tracing::info!("found {} packages", packages.len());
        Ok(packages)
    }

    /// Objects contained in a package
    ///
    /// # Errors
    /// - `AdtError::NotFound` if the package does not exist
    pub async fn get_package_contents(&self, name: &str) -> AdtResult<PackageInfo> {
        self.require_authenticated()?;
        let name = name.trim().to_uppercase();
        if name.is_empty() {
            return Err(AdtError::InvalidInput("package name is empty".to_string()));
        }
        tracing::info!("retrieving package contents: {}", name);

        let form = format!(
            "parent_type={}&parent_name={}&withShortDescriptions=true",
            form_encode(ObjectKind::Package.adt_type()),
            form_encode(&name)
        );
        let headers = self
            .write_headers(Accept::Xml)?
            .with("Content-Type", "application/x-www-form-urlencoded");
        let request = self
            .request(Method::POST, NODE_STRUCTURE_PATH, headers)
            .with_body(form);

        let response = self.transport.send(request).await?;
        if response.status != 200 {
            return Err(response.into_error(&format!("package {name}")));
        }

        let objects = xml::parse_node_structure(&response.body);
        tracing::info!("package {} holds {} objects", name, objects.len());
        Ok(PackageInfo {
            description: format!("Package {name}"),
            name,
            objects,
        })
    }

    /// Dictionary type: domain source first, data element metadata second
    ///
    /// # Errors
    /// - `AdtError::NotFound` if neither exists
    pub async fn get_type_info(&self, name: &str) -> AdtResult<TypeInfo> {
        self.require_authenticated()?;
        let domain = ObjectKind::Domain.reference(name, None)?;
        tracing::info!("retrieving type info: {}", domain.name());

        let response = self.get(&domain.source_path(), Accept::PlainText).await?;
        if response.status == 200 {
            return Ok(TypeInfo {
                name: domain.name().to_string(),
                kind: TypeKind::Domain,
                source: response.body,
            });
        }
        tracing::debug!("{} is not a domain (HTTP {})", domain.name(), response.status);

        let element = ObjectKind::DataElement.reference(name, None)?;
        let response = self.get(element.path(), Accept::Xml).await?;
        if response.status == 200 {
            return Ok(TypeInfo {
                name: element.name().to_string(),
                kind: TypeKind::DataElement,
                source: response.body,
            });
        }

        match response.status {
            404 => Err(AdtError::NotFound(format!(
                "type {} (neither domain nor data element)",
                element.name()
            ))),
            _ => Err(response.into_error(&format!("type {}", element.name()))),
        }
    }

    /// Package and application component of a transaction code
    ///
    /// # Errors
    /// - `AdtError::NotFound` if the transaction does not exist
    pub async fn get_transaction(&self, code: &str) -> AdtResult<TransactionInfo> {
        self.require_authenticated()?;
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(AdtError::InvalidInput("transaction code is empty".to_string()));
        }
        tracing::info!("retrieving transaction: {}", code);

        let request = self
            .request(Method::GET, OBJECT_PROPERTIES_PATH, self.read_headers(Accept::Xml))
            .with_query("uri", format!("{TRANSACTION_URI_PREFIX}{}", form_encode(&code)))
            .with_query("facet", "package")
            .with_query("facet", "appl");

        let response = self.transport.send(request).await?;
        if response.status != 200 {
            return Err(response.into_error(&format!("transaction {code}")));
        }

        let info = xml::parse_transaction_properties(&code, &response.body);
        tracing::info!("retrieved transaction {} ({} bytes)", code, response.body.len());
        Ok(info)
    }

    /// Rows of a table from the data-preview service
    ///
    /// # Errors
    /// - `AdtError::ServiceUnavailable` if the service is not deployed
    /// - `AdtError::Protocol` if the JSON cannot be decoded
    pub async fn get_table_contents(&self, table: &str, max_rows: usize) -> AdtResult<TableData> {
        self.require_authenticated()?;
        let table = table.trim().to_uppercase();
        let max_rows = if max_rows == 0 { DEFAULT_MAX_ROWS } else { max_rows };
        tracing::info!("retrieving table contents: {} (max {} rows)", table, max_rows);

        let request = self
            .request(
                Method::GET,
                &format!("{TABLE_CONTENTS_PATH}/{table}"),
                self.read_headers(Accept::Json),
            )
            .with_query("maxRows", max_rows.to_string());

        let response = self.transport.send(request).await?;
        match response.status {
            200 => {}
            404 => {
                return Err(AdtError::ServiceUnavailable(format!(
                    "table contents requires the custom service at {TABLE_CONTENTS_PATH}"
                )))
            }
            _ => return Err(response.into_error(&format!("table {table}"))),
        }

        let mut data: TableData = serde_json::from_str(&response.body).map_err(|e| {
            AdtError::protocol_with_raw(format!("invalid table contents JSON: {e}"), &response.body)
        })?;
        if data.table_name.is_empty() {
            data.table_name = table;
        }
        if data.row_count == 0 {
            data.row_count = data.rows.len();
        }
        tracing::info!("retrieved {} rows", data.row_count);
        Ok(data)
    }

    pub(crate) fn require_authenticated(&self) -> AdtResult<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AdtError::NotAuthenticated)
        }
    }

    pub(crate) fn read_headers(&self, accept: Accept) -> RequestHeaders {
        self.session.read().headers(&self.profile, accept)
    }

    pub(crate) fn write_headers(&self, accept: Accept) -> AdtResult<RequestHeaders> {
        self.session.read().write_headers(&self.profile, accept)
    }

    /// Request for a path below the ADT root
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        headers: RequestHeaders,
    ) -> OutboundRequest {
        OutboundRequest::new(method, self.session.read().url(path), headers)
    }

    pub(crate) async fn send(&self, request: OutboundRequest) -> AdtResult<RawResponse> {
        self.transport.send(request).await
    }

    async fn get(&self, path: &str, accept: Accept) -> AdtResult<RawResponse> {
        let request = self.request(Method::GET, path, self.read_headers(accept));
        self.transport.send(request).await
    }
}

fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}
