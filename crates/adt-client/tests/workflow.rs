//! Lock, mutation and read workflows against a mock ADT server

use adt_client::AdtClient;
use adt_core::{AdtError, AdtResult, ConflictKind, LockHandle, NewObject, ObjectKind};
use adt_test_utils::{
    adt_path, mount_handshake, mount_lock, test_profile, ASX_LOCK_BODY, REFERENCE_LOCK_BODY,
    TEST_LOCK_HANDLE, TEST_TRANSPORT,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROGRAM: &str = "/programs/programs/ZTEST";

async fn connected() -> (MockServer, AdtClient) {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    let client = AdtClient::connect(test_profile(&server)).await.unwrap();
    (server, client)
}

async fn mount_unlock(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(adt_path(PROGRAM)))
        .and(query_param("_action", "UNLOCK"))
        .and(query_param("lockHandle", TEST_LOCK_HANDLE))
        .and(header("content-length", "0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_activation(server: &MockServer, body: &str) {
    Mock::given(method("POST"))
        .and(path(adt_path("/activation")))
        .and(query_param("method", "activate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn program() -> adt_core::ObjectReference {
    ObjectKind::Program.reference("ztest", None).unwrap()
}

#[tokio::test]
async fn lock_parses_both_encodings() {
    for body in [ASX_LOCK_BODY, REFERENCE_LOCK_BODY] {
        let (server, client) = connected().await;
        mount_lock(&server, PROGRAM, body).await;

        let handle = client.lock(&program()).await.unwrap();
        assert_eq!(handle.token(), TEST_LOCK_HANDLE);
        assert_eq!(handle.transport(), Some(TEST_TRANSPORT));
    }
}

#[tokio::test]
async fn lock_and_unlock_send_zero_content_length() {
    let (server, client) = connected().await;
    mount_lock(&server, PROGRAM, ASX_LOCK_BODY).await;
    mount_unlock(&server, 1).await;

    let handle = client.lock(&program()).await.unwrap();
    client.unlock(&program(), &handle).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let locking: Vec<_> = requests
        .iter()
        .filter(|r| r.url.query().is_some_and(|q| q.contains("LOCK")))
        .collect();
    assert_eq!(locking.len(), 2);
    for request in locking {
        assert_eq!(
            request.headers.get("content-length").map(|v| v.to_str().unwrap()),
            Some("0")
        );
        assert!(request.body.is_empty());
    }
}

#[tokio::test]
async fn lock_falls_back_to_header() {
    let (server, client) = connected().await;
    Mock::given(method("POST"))
        .and(path(adt_path(PROGRAM)))
        .and(query_param("_action", "LOCK"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("sap-adt-lockhandle", "HDR123")
                .set_body_string("<ok/>"),
        )
        .mount(&server)
        .await;

    let handle = client.lock(&program()).await.unwrap();
    assert_eq!(handle.token(), "HDR123");
    assert_eq!(handle.transport(), None);
}

#[tokio::test]
async fn lock_retries_once_on_missing_content_type() {
    let (server, client) = connected().await;
    Mock::given(method("POST"))
        .and(path(adt_path(PROGRAM)))
        .and(query_param("_action", "LOCK"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ASX_LOCK_BODY))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(adt_path(PROGRAM)))
        .and(query_param("_action", "LOCK"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Content type missing"))
        .expect(1)
        .mount(&server)
        .await;

    let handle = client.lock(&program()).await.unwrap();
    assert_eq!(handle.token(), TEST_LOCK_HANDLE);
}

#[tokio::test]
async fn second_missing_content_type_is_protocol_error() {
    let (server, client) = connected().await;
    Mock::given(method("POST"))
        .and(path(adt_path(PROGRAM)))
        .and(query_param("_action", "LOCK"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Content type missing"))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.lock(&program()).await.unwrap_err();
    assert!(matches!(err, AdtError::Protocol { raw: Some(_), .. }));
}

#[tokio::test]
async fn foreign_lock_is_conflict() {
    let (server, client) = connected().await;
    Mock::given(method("POST"))
        .and(path(adt_path(PROGRAM)))
        .and(query_param("_action", "LOCK"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Object locked by user DEV2"))
        .mount(&server)
        .await;

    let err = client.lock(&program()).await.unwrap_err();
    assert!(err.is_already_locked());
}

#[tokio::test]
async fn update_runs_lock_put_unlock_activate() {
    let (server, client) = connected().await;
    mount_lock(&server, PROGRAM, REFERENCE_LOCK_BODY).await;
    Mock::given(method("PUT"))
        .and(path(adt_path("/programs/programs/ZTEST/source/main")))
        .and(query_param("lockHandle", TEST_LOCK_HANDLE))
        .and(query_param("corrNr", TEST_TRANSPORT))
        .and(header("content-type", "text/plain; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_unlock(&server, 1).await;
    mount_activation(
        &server,
        r#"<chkl:messages xmlns:chkl="http://www.sap.com/abapxml/checklist"><msg type="W" shortText="Unused variable"/></chkl:messages>"#,
    )
    .await;

    let outcome = client
        .update_object(ObjectKind::Program, "ztest", &[], "REPORT ztest.")
        .await
        .unwrap();

    assert_eq!(outcome.object.name(), "ZTEST");
    let report = outcome.activation.unwrap();
    assert_eq!(report.messages.len(), 1);
    assert!(!report.has_errors());
}

#[tokio::test]
async fn failed_put_still_unlocks_once() {
    let (server, client) = connected().await;
    mount_lock(&server, PROGRAM, ASX_LOCK_BODY).await;
    Mock::given(method("PUT"))
        .and(path(adt_path("/programs/programs/ZTEST/source/main")))
        .respond_with(ResponseTemplate::new(500).set_body_string("dump"))
        .mount(&server)
        .await;
    mount_unlock(&server, 1).await;

    let err = client
        .set_source(&program(), "REPORT ztest.", true)
        .await
        .unwrap_err();

    assert!(matches!(err, AdtError::Server { status: 500, .. }));
}

#[tokio::test]
async fn failed_put_and_failed_unlock_reports_both() {
    let (server, client) = connected().await;
    mount_lock(&server, PROGRAM, ASX_LOCK_BODY).await;
    Mock::given(method("PUT"))
        .and(path(adt_path("/programs/programs/ZTEST/source/main")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(adt_path(PROGRAM)))
        .and(query_param("_action", "UNLOCK"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .set_source(&program(), "REPORT ztest.", false)
        .await
        .unwrap_err();

    assert!(matches!(err, AdtError::UnlockAlsoFailed { .. }));
    assert!(matches!(err.primary(), AdtError::Server { status: 500, .. }));
}

async fn exploding_body(_handle: LockHandle) -> AdtResult<()> {
    panic!("mutation body failed");
}

#[tokio::test]
async fn panicking_body_unlocks_and_resumes_panic() {
    let (server, client) = connected().await;
    mount_lock(&server, PROGRAM, ASX_LOCK_BODY).await;
    mount_unlock(&server, 1).await;
    let client = Arc::new(client);

    let task = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.with_lock(&program(), exploding_body).await }
    });

    let joined = task.await;
    assert!(joined.unwrap_err().is_panic());
}

#[tokio::test]
async fn create_existing_object_is_conflict() {
    let (server, client) = connected().await;
    Mock::given(method("POST"))
        .and(path(adt_path("/programs/programs")))
        .respond_with(ResponseTemplate::new(409).set_body_string("ZTEST already exists"))
        .mount(&server)
        .await;

    let request = NewObject::new(ObjectKind::Program, "ztest").with_source("REPORT ztest.");
    let err = client.create_object(&request).await.unwrap_err();

    assert!(matches!(
        err,
        AdtError::Conflict {
            kind: ConflictKind::AlreadyExists,
            ..
        }
    ));
}

#[tokio::test]
async fn create_without_source_activates_directly() {
    let (server, client) = connected().await;
    Mock::given(method("POST"))
        .and(path(adt_path("/programs/programs")))
        .and(header("content-type", "application/vnd.sap.adt.programs.programs.v2+xml"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_activation(&server, "").await;

    let outcome = client
        .create_object(&NewObject::new(ObjectKind::Program, "ztest"))
        .await
        .unwrap();
    assert!(outcome.activation.is_some());
}

#[tokio::test]
async fn source_read_carries_etag() {
    let (server, client) = connected().await;
    Mock::given(method("GET"))
        .and(path(adt_path("/programs/programs/ZTEST/source/main")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "20240101120000")
                .set_body_string("REPORT ztest."),
        )
        .mount(&server)
        .await;

    let source = client
        .get_source(ObjectKind::Program, "ztest", &[])
        .await
        .unwrap();
    assert_eq!(source.source, "REPORT ztest.");
    assert_eq!(source.etag, "20240101120000");
}

#[tokio::test]
async fn search_filters_by_kind() {
    let (server, client) = connected().await;
    Mock::given(method("GET"))
        .and(path(adt_path("/repository/informationsystem/search")))
        .and(query_param("operation", "quickSearch"))
        .and(query_param("query", "ZHEL*"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<adtcore:objectReferences xmlns:adtcore="http://www.sap.com/adt/core">
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/programs/programs/ZHELLO" adtcore:type="PROG/P" adtcore:name="ZHELLO"/>
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/oo/classes/ZHELPER" adtcore:type="CLAS/OC" adtcore:name="ZHELPER"/>
</adtcore:objectReferences>"#,
        ))
        .mount(&server)
        .await;

    let result = client
        .search_objects("ZHEL", &[ObjectKind::Program])
        .await
        .unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.objects[0].name, "ZHELLO");
}

#[tokio::test]
async fn missing_table_service_is_unavailable() {
    let (server, client) = connected().await;
    Mock::given(method("GET"))
        .and(path(adt_path("/z_mcp_abap_adt/z_tablecontent/MARA")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.get_table_contents("mara", 10).await.unwrap_err();
    assert!(matches!(err, AdtError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn table_contents_are_decoded() {
    let (server, client) = connected().await;
    Mock::given(method("GET"))
        .and(path(adt_path("/z_mcp_abap_adt/z_tablecontent/T000")))
        .and(query_param("maxRows", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"columns":[{"name":"MANDT"}],"rows":[{"MANDT":"000"},{"MANDT":"100"}]}"#,
        ))
        .mount(&server)
        .await;

    let data = client.get_table_contents("t000", 2).await.unwrap();
    assert_eq!(data.table_name, "T000");
    assert_eq!(data.row_count, 2);
}

#[tokio::test]
async fn transaction_facets_are_read() {
    let (server, client) = connected().await;
    Mock::given(method("GET"))
        .and(path(adt_path("/repository/informationsystem/objectproperties/values")))
        .and(query_param("uri", "/sap/bc/adt/vit/wb/object_type/trant/object_name/SE38"))
        .and(query_param("facet", "package"))
        .and(query_param("facet", "appl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<opr:objectProperties xmlns:opr="http://www.sap.com/adt/objectproperties">
  <opr:object name="SE38" text="ABAP Editor" type="TRAN/T"/>
  <opr:property facet="PACKAGE" name="SEDT"/>
  <opr:property facet="APPL" name="BC-DWB-TOO"/>
</opr:objectProperties>"#,
        ))
        .mount(&server)
        .await;

    let info = client.get_transaction(" se38 ").await.unwrap();
    assert_eq!(info.transaction_code, "SE38");
    assert_eq!(info.description, "ABAP Editor");
    assert_eq!(info.package, "SEDT");
    assert_eq!(info.application, "BC-DWB-TOO");
}

#[tokio::test]
async fn unknown_transaction_is_not_found() {
    let (server, client) = connected().await;
    Mock::given(method("GET"))
        .and(path(adt_path("/repository/informationsystem/objectproperties/values")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.get_transaction("ZNOPE").await.unwrap_err();
    assert_eq!(err, AdtError::NotFound("transaction ZNOPE".to_string()));
}
