// Copyright (c) 2025 ADBC Drivers Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Integration tests for the Trino driver.

mod common;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::ReplayBackend;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use trino_driver::auth::AuthMethod;
use trino_driver::client::HttpMethod;
use trino_driver::result::ResultSet;
use trino_driver::statement::{DataStatus, FetchOutcome};
use trino_driver::token_cache::TokenCache;
use trino_driver::{Driver, ErrorKind};

const NEXT: &str = "http://trino:8080/v1/statement/executing/20240101_q/y";

fn jwt_valid_for(secs: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"svc","exp":{}}}"#, now + secs));
    format!("{header}.{payload}.sig")
}

fn script_query(backend: &ReplayBackend) {
    let columns = json!([
        {"name": "node_id", "type": "varchar", "typeSignature": {"rawType": "varchar", "arguments": [{"kind": "LONG", "value": 2147483647}]}},
        {"name": "started", "type": "timestamp(3)", "typeSignature": {"rawType": "timestamp", "arguments": [{"kind": "LONG", "value": 3}]}}
    ]);
    backend.push_json(200, json!({"id": "20240101_q", "nextUri": format!("{NEXT}/1"), "stats": {"state": "QUEUED"}}));
    backend.push_json(503, json!({}));
    backend.push_json(200, json!({
        "id": "20240101_q",
        "nextUri": format!("{NEXT}/2"),
        "columns": columns,
        "data": [["coordinator", "2024-01-02 03:04:05.678"]],
        "stats": {"state": "RUNNING"}
    }));
    backend.push_json(200, json!({
        "id": "20240101_q",
        "data": [["worker-1", null]],
        "stats": {"state": "FINISHED"}
    }));
}

#[test]
fn test_driver_database_connection_flow() {
    let driver = Driver::new();
    let database = driver
        .new_database_with_opts([("hostname", "http://trino"), ("port", "8080"), ("user", "analyst")])
        .expect("Failed to create database");

    let backend = ReplayBackend::new();
    let mut connection = database
        .new_connection_with_backend(Box::new(backend.clone()))
        .expect("Failed to connect");

    backend.push_json(200, json!({"nodeVersion": {"version": "438"}, "environment": "test", "starting": false}));
    assert_eq!(connection.server_version().unwrap(), "438");

    let mut statement = connection.new_statement().expect("Failed to create statement");
    script_query(&backend);
    statement.execute("SELECT node_id, started FROM nodes").unwrap();

    let columns = statement.column_descriptions().unwrap();
    assert_eq!(columns[0].name, "node_id");
    assert_eq!(columns[1].raw_type(), "timestamp");

    assert_eq!(statement.fetch().unwrap(), FetchOutcome::Row);
    let mut name = [0u8; 32];
    let mut len: isize = 0;
    assert_eq!(
        statement.get_data(1, 1, &mut name, Some(&mut len)).unwrap(),
        DataStatus::Success
    );
    assert_eq!(&name[..len as usize], b"coordinator");

    let mut ts = [0u8; 16];
    statement.get_data(2, 93, &mut ts, Some(&mut len)).unwrap();
    assert_eq!(len, 16);
    assert_eq!(i16::from_ne_bytes([ts[0], ts[1]]), 2024);
    assert_eq!(u16::from_ne_bytes([ts[8], ts[9]]), 4);
    assert_eq!(u32::from_ne_bytes([ts[12], ts[13], ts[14], ts[15]]), 678_000_000);

    assert_eq!(statement.fetch().unwrap(), FetchOutcome::Row);
    statement.get_data(2, 93, &mut ts, Some(&mut len)).unwrap();
    assert_eq!(len, -1);
    assert_eq!(statement.fetch().unwrap(), FetchOutcome::NoData);
    assert_eq!(statement.row_count(), 2);

    let requests = backend.requests();
    assert!(requests
        .iter()
        .all(|r| r.header_value("X-Trino-Source") == Some("TrinoODBCDriver")));
    assert!(requests
        .iter()
        .all(|r| r.header_value("X-Trino-User") == Some("analyst")));
    assert_eq!(requests[1].method, HttpMethod::Post);
    assert_eq!(requests[1].url, "http://trino:8080/v1/statement");

    connection.disconnect();
    assert!(backend.close_count() >= 1);
}

#[test]
fn test_arrow_result_set_from_statement() {
    let database = Driver::new()
        .new_database_from_connection_string("hostname=http://trino;port=8080")
        .unwrap();
    let backend = ReplayBackend::new();
    let connection = database
        .new_connection_with_backend(Box::new(backend.clone()))
        .unwrap();
    let mut statement = connection.new_statement().unwrap();
    script_query(&backend);
    statement.execute("SELECT node_id, started FROM nodes").unwrap();

    let rs = ResultSet::from_query(statement.query_mut(), 1).unwrap();
    assert_eq!(rs.batch_count(), 2);
    assert_eq!(rs.row_count(), 2);
    assert_eq!(statement.query().buffered_row_count(), 0);
}

#[test]
fn test_client_credentials_reuses_cached_token() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("tokens.json");
    let connection_string = format!(
        "hostname=https://trino;port=443;authmethod=OIDC Client Cred Auth;\
         oidcDiscoveryUrl=https://idp/.well-known/openid-configuration;\
         clientId=svc;clientSecret=s3cret;oidcScope=trino;tokenCachePath={}",
        cache_path.display()
    );
    let database = Driver::new()
        .new_database_from_connection_string(&connection_string)
        .unwrap();
    assert_eq!(database.config().auth_method, AuthMethod::ClientCredentials);

    let token = jwt_valid_for(3600);
    let first = ReplayBackend::new();
    first.push_json(200, json!({"token_endpoint": "https://idp/token"}));
    first.push_json(200, json!({"access_token": token, "token_type": "Bearer"}));
    first.push_json(200, json!({"nodeVersion": {"version": "438"}}));
    let connection = database
        .new_connection_with_backend(Box::new(first.clone()))
        .unwrap();
    assert_eq!(connection.server_version().unwrap(), "438");

    let requests = first.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].method, HttpMethod::Post);
    assert_eq!(
        requests[2].header_value("Authorization"),
        Some(format!("Bearer {token}").as_str())
    );

    let cache = TokenCache::new(cache_path.clone(), database.config().secret_encryption_level);
    let entry = cache.load("svc__trino__https://trino__443");
    assert_eq!(entry.access_token, token);
    assert!(!std::fs::read_to_string(&cache_path).unwrap().contains(&token));

    // A second connection finds the token on disk.
    let second = ReplayBackend::new();
    second.push_json(200, json!({"nodeVersion": {"version": "438"}}));
    let connection = database
        .new_connection_with_backend(Box::new(second.clone()))
        .unwrap();
    assert_eq!(connection.server_version().unwrap(), "438");
    assert_eq!(second.request_count(), 1);
}

#[test]
fn test_failed_token_request_is_unauthenticated() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = Driver::new().new_database().unwrap();
    for (key, value) in [
        ("authmethod", "OIDC Client Cred Auth"),
        ("oidcDiscoveryUrl", "https://idp/.well-known/openid-configuration"),
        ("clientId", "svc"),
        ("oidcScope", "trino"),
    ] {
        database.set_option(key, value).unwrap();
    }
    database
        .set_option("tokenCachePath", &dir.path().join("tokens.json").display().to_string())
        .unwrap();

    let backend = ReplayBackend::new();
    backend.push_json(200, json!({"token_endpoint": "https://idp/token"}));
    backend.push_json(401, json!({"error": "invalid_client"}));
    let connection = database
        .new_connection_with_backend(Box::new(backend.clone()))
        .unwrap();
    let err = connection.server_version().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert_eq!(backend.request_count(), 2);
}
