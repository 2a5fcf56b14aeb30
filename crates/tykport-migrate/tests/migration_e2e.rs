//! End-to-end migration tests.
//!
//! Archives are written into a temporary export directory and a wiremock
//! server plays the Tyk Dashboard, so the full extract → check → import loop
//! runs without WSO2 or Tyk.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tykport_migrate::{
    Exporter, MatchPolicy, MigrationConfig, MigrationError, Migrator, RecordOutcome, Result,
};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const TOKEN: &str = "tyk-secret";

/// Exporter that hands out a directory prepared by the test.
struct DirExporter(PathBuf);

#[async_trait]
impl Exporter for DirExporter {
    async fn export(&self) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

struct FailingExporter;

#[async_trait]
impl Exporter for FailingExporter {
    async fn export(&self) -> Result<PathBuf> {
        Err(MigrationError::ExportFailed("apictl exited with 1".to_string()))
    }
}

/// In-memory Tyk Dashboard: imports are added to the listing.
#[derive(Clone, Default)]
struct FakeTyk {
    apis: Arc<Mutex<Vec<Value>>>,
}

impl FakeTyk {
    fn with_api(self, name: &str, listen_path: &str, target_url: &str) -> Self {
        self.apis.lock().unwrap().push(api_entry(name, listen_path, target_url));
        self
    }

    fn len(&self) -> usize {
        self.apis.lock().unwrap().len()
    }

    async fn mount(&self, server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/apis"))
            .and(query_param("p", "-1"))
            .and(header("Authorization", TOKEN))
            .respond_with(ListingResponder(self.clone()))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/apis/oas/import"))
            .and(header("Authorization", TOKEN))
            .respond_with(ImportResponder(self.clone()))
            .mount(server)
            .await;
    }
}

struct ListingResponder(FakeTyk);

impl Respond for ListingResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let apis = self.0.apis.lock().unwrap().clone();
        ResponseTemplate::new(200).set_body_json(json!({ "apis": apis, "pages": 1 }))
    }
}

struct ImportResponder(FakeTyk);

impl Respond for ImportResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let query = |key: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        };
        let doc: Value = serde_json::from_slice(&request.body).unwrap();
        let name = doc["info"]["title"].as_str().unwrap_or_default().to_string();

        self.0
            .apis
            .lock()
            .unwrap()
            .push(api_entry(&name, &query("listenPath"), &query("upstreamURL")));

        ResponseTemplate::new(200).set_body_json(json!({
            "Status": "OK",
            "Message": "API created",
            "Meta": "64f0c2"
        }))
    }
}

fn api_entry(name: &str, listen_path: &str, target_url: &str) -> Value {
    json!({
        "api_definition": {
            "name": name,
            "proxy": { "listen_path": listen_path, "target_url": target_url }
        }
    })
}

fn swagger(title: &str, base_path: &str, target: &str) -> Value {
    json!({
        "swagger": "2.0",
        "info": { "title": title, "version": "1.0.0" },
        "x-wso2-basePath": base_path,
        "x-wso2-production-endpoints": { "urls": [target], "type": "http" },
        "paths": { "/": { "get": { "responses": { "200": { "description": "ok" } } } } }
    })
}

fn write_archive_bytes(dir: &Path, file_name: &str, entry: &str, content: &[u8]) {
    let mut zip = ZipWriter::new(std::fs::File::create(dir.join(file_name)).unwrap());
    zip.start_file(entry, SimpleFileOptions::default()).unwrap();
    zip.write_all(content).unwrap();
    zip.finish().unwrap();
}

fn write_archive(dir: &Path, file_name: &str, entry: &str, doc: &Value) {
    write_archive_bytes(dir, file_name, entry, &serde_json::to_vec(doc).unwrap());
}

fn write_api(dir: &Path, name: &str, base_path: &str, target: &str) {
    write_archive(
        dir,
        &format!("{name}_1.0.0.zip"),
        &format!("{name}-1.0.0/Definitions/swagger.json"),
        &swagger(name, base_path, target),
    );
}

fn config(server: &MockServer) -> MigrationConfig {
    MigrationConfig::new(server.uri(), TOKEN).with_timeout_secs(5)
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let server = MockServer::start().await;
    let tyk = FakeTyk::default();
    tyk.mount(&server).await;

    let export = TempDir::new().unwrap();
    write_api(export.path(), "Orders", "/orders", "http://orders.internal:8080");
    write_api(export.path(), "Payments", "/payments", "https://pay.internal");

    let migrator =
        Migrator::new(DirExporter(export.path().to_path_buf()), &config(&server)).unwrap();

    let first = migrator.migrate().await.unwrap();
    assert_eq!(first.migrated, 2);
    assert_eq!(first.skipped, 0);
    assert_eq!(tyk.len(), 2);

    let second = migrator.migrate().await.unwrap();
    assert_eq!(second.migrated, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.failed, 0);
    assert_eq!(tyk.len(), 2);
}

#[tokio::test]
async fn test_bad_archives_do_not_abort_run() {
    let server = MockServer::start().await;
    let tyk = FakeTyk::default();
    tyk.mount(&server).await;

    let export = TempDir::new().unwrap();
    write_api(export.path(), "Alpha", "/alpha", "http://alpha.internal");
    write_archive(
        export.path(),
        "Broken_1.0.0.zip",
        "Broken-1.0.0/Definitions/swagger.json",
        &json!({ "info": { "title": "Broken", "version": "1.0.0" } }),
    );
    std::fs::write(export.path().join("Corrupt_1.0.0.zip"), b"not a zip").unwrap();
    write_api(export.path(), "Zulu", "/zulu", "http://zulu.internal");

    let migrator =
        Migrator::new(DirExporter(export.path().to_path_buf()), &config(&server)).unwrap();
    let report = migrator.migrate().await.unwrap();

    assert_eq!(report.total(), 4);
    assert_eq!(report.migrated, 2);
    assert_eq!(report.failed, 2);

    let archives: Vec<_> = report.records.iter().map(|r| r.archive.as_str()).collect();
    assert_eq!(
        archives,
        vec![
            "Alpha_1.0.0.zip",
            "Broken_1.0.0.zip",
            "Corrupt_1.0.0.zip",
            "Zulu_1.0.0.zip"
        ]
    );
    assert!(matches!(
        report.records[1].outcome,
        RecordOutcome::Failed { ref reason } if reason.contains("x-wso2-basePath")
    ));
}

#[tokio::test]
async fn test_localhost_target_warns_and_still_imports() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/apis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "apis": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/apis/oas/import"))
        .and(query_param("listenPath", "/orders"))
        .and(query_param("upstreamURL", "http://localhost:8080"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Status": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let export = TempDir::new().unwrap();
    write_api(export.path(), "Orders", "/orders", "http://localhost:8080");

    let migrator =
        Migrator::new(DirExporter(export.path().to_path_buf()), &config(&server)).unwrap();
    let report = migrator.migrate().await.unwrap();

    assert_eq!(report.migrated, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("localhost"));
}

#[tokio::test]
async fn test_import_posts_archive_bytes_verbatim() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/apis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "apis": [] })))
        .mount(&server)
        .await;

    // Keys out of alphabetical order, with indentation, as apictl writes them.
    let document = r#"{
    "swagger": "2.0",
    "x-wso2-production-endpoints": { "urls": ["http://orders.internal"], "type": "http" },
    "x-wso2-basePath": "/orders",
    "info": { "version": "1.0.0", "title": "Orders" },
    "paths": {}
}"#;

    Mock::given(method("POST"))
        .and(path("/api/apis/oas/import"))
        .and(header("Content-Type", "application/json"))
        .and(body_string(document))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Status": "OK" })))
        .expect(1)
        .mount(&server)
        .await;

    let export = TempDir::new().unwrap();
    write_archive_bytes(
        export.path(),
        "Orders_1.0.0.zip",
        "Orders-1.0.0/Definitions/swagger.json",
        document.as_bytes(),
    );

    let migrator =
        Migrator::new(DirExporter(export.path().to_path_buf()), &config(&server)).unwrap();
    let report = migrator.migrate().await.unwrap();

    assert_eq!(report.migrated, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_rejected_import_is_counted_as_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/apis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "apis": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/apis/oas/import"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Status": "Error",
            "Message": "listen path is already in use"
        })))
        .mount(&server)
        .await;

    let export = TempDir::new().unwrap();
    write_api(export.path(), "Orders", "/orders", "http://orders.internal");

    let migrator =
        Migrator::new(DirExporter(export.path().to_path_buf()), &config(&server)).unwrap();
    let report = migrator.migrate().await.unwrap();

    assert_eq!(report.migrated, 0);
    assert_eq!(report.failed, 1);
    let (_, reason) = report.failures().next().unwrap();
    assert!(reason.contains("listen path is already in use"));
}

#[tokio::test]
async fn test_target_url_policy() {
    let server = MockServer::start().await;
    let tyk = FakeTyk::default().with_api("Orders", "/orders", "http://old-orders.internal");
    tyk.mount(&server).await;

    let export = TempDir::new().unwrap();
    write_api(export.path(), "Orders", "/orders", "http://new-orders.internal");
    let exporter = || DirExporter(export.path().to_path_buf());

    let by_path = Migrator::new(exporter(), &config(&server)).unwrap();
    let report = by_path.migrate().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(tyk.len(), 1);

    let by_target = Migrator::new(
        exporter(),
        &config(&server).with_match_policy(MatchPolicy::NameListenPathTarget),
    )
    .unwrap();
    let report = by_target.migrate().await.unwrap();
    assert_eq!(report.migrated, 1);
    assert_eq!(tyk.len(), 2);
}

#[tokio::test]
async fn test_listing_failure_fails_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/apis"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/apis/oas/import"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Status": "OK" })))
        .expect(0)
        .mount(&server)
        .await;

    let export = TempDir::new().unwrap();
    write_api(export.path(), "Orders", "/orders", "http://orders.internal");

    let migrator =
        Migrator::new(DirExporter(export.path().to_path_buf()), &config(&server)).unwrap();
    let report = migrator.migrate().await.unwrap();

    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn test_export_failure_is_fatal() {
    let server = MockServer::start().await;
    let migrator = Migrator::new(FailingExporter, &config(&server)).unwrap();

    let result = migrator.migrate().await;
    assert!(matches!(result, Err(MigrationError::ExportFailed(_))));
}

#[tokio::test]
async fn test_health_check_rejects_bad_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/apis"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "Status": "Error",
            "Message": "Not authorised"
        })))
        .mount(&server)
        .await;

    let migrator = Migrator::new(FailingExporter, &config(&server)).unwrap();
    let result = migrator.tyk().health_check().await;

    assert!(matches!(result, Err(MigrationError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_health_check_accepts_empty_dashboard() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/apis"))
        .and(header("Authorization", TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"apis":null,"pages":0}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let migrator = Migrator::new(FailingExporter, &config(&server)).unwrap();

    assert!(migrator.tyk().health_check().await.is_ok());
    assert!(migrator.tyk().list_apis().await.unwrap().is_empty());
}
