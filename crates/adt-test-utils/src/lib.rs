//! Testing utilities for the ADT workspace
//!
//! Profile fixtures, canned lock payloads and a mock ADT handshake.

#![allow(missing_docs)]

use adt_core::profile::ADT_ROOT_PATH;
use adt_core::{ConnectionProfile, Secret};
use wiremock::matchers::{basic_auth, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_USER: &str = "DEVELOPER";
pub const TEST_PASSWORD: &str = "s3cret-pass";
pub const TEST_TOKEN: &str = "k3Yq9fZtXwLm0aBc==";
pub const TEST_LOCK_HANDLE: &str = "8D3F1A2B3C4D5E6F";
pub const TEST_TRANSPORT: &str = "DEVK900123";

/// Lock result in the `asx:abap` envelope
pub const ASX_LOCK_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0">
  <asx:values>
    <DATA>
      <LOCK_HANDLE>8D3F1A2B3C4D5E6F</LOCK_HANDLE>
      <CORRNR>DEVK900123</CORRNR>
      <CORRUSER>DEVELOPER</CORRUSER>
    </DATA>
  </asx:values>
</asx:abap>"#;

/// Lock result as object-reference attributes
pub const REFERENCE_LOCK_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<adtcore:objectReference xmlns:adtcore="http://www.sap.com/adt/core"
    adtcore:uri="/sap/bc/adt/programs/programs/ZTEST"
    adtcore:lockHandle="8D3F1A2B3C4D5E6F" adtcore:corrNr="DEVK900123"/>"#;

/// Full ADT path for a path below the root
pub fn adt_path(path: &str) -> String {
    format!("{ADT_ROOT_PATH}{path}")
}

/// Profile pointing at a mock server with the fixture credentials
pub fn test_profile(server: &MockServer) -> ConnectionProfile {
    profile_with_password(server, TEST_PASSWORD)
}

pub fn profile_with_password(server: &MockServer, password: &str) -> ConnectionProfile {
    ConnectionProfile::new(server.uri(), TEST_USER, Secret::new(password))
}

/// Mount a handshake that accepts only the fixture credentials
///
/// Covers the connectivity probe, login, token fetch, validation and the
/// ping endpoint. Wrong credentials get 401 everywhere.
pub async fn mount_handshake(server: &MockServer) {
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("server", "SAP NetWeaver"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(adt_path("/discovery")))
        .and(basic_auth(TEST_USER, TEST_PASSWORD))
        .and(header("x-csrf-token", "Fetch"))
        .respond_with(ResponseTemplate::new(200).insert_header("x-csrf-token", TEST_TOKEN))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(adt_path("/core/info/system")))
        .and(basic_auth(TEST_USER, TEST_PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_string("<system/>"))
        .mount(server)
        .await;

    Mock::given(method("HEAD"))
        .and(path(adt_path("/discovery")))
        .and(basic_auth(TEST_USER, TEST_PASSWORD))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    Mock::given(wiremock::matchers::path_regex(format!("^{ADT_ROOT_PATH}/")))
        .respond_with(ResponseTemplate::new(401).set_body_string("Logon failed"))
        .with_priority(u8::MAX)
        .mount(server)
        .await;
}

/// Mount a lock endpoint for `object_path` answering with `body`
pub async fn mount_lock(server: &MockServer, object_path: &str, body: &str) {
    Mock::given(method("POST"))
        .and(path(adt_path(object_path)))
        .and(wiremock::matchers::query_param("_action", "LOCK"))
        .and(header("content-length", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}
