//! HTTP transport behaviour against a mocked API.

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bigml::{
    ClientConfig, Document, HttpTransport, PollingPolicy, ResourceClient, ResourceError,
    ResourceKind, Transport,
};

const TS: &str = "timeseries/abc123def456abc123def456";
const FC: &str = "forecast/5af06df94e17277501000010";

fn config(uri: &str) -> ClientConfig {
    ClientConfig::new("alice", "s3cr3t").with_url(uri)
}

#[tokio::test]
async fn get_sends_credentials_in_query() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{FC}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": FC,
            "status": {"code": 5, "message": "The forecast has been created"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let doc = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&config(&uri)).unwrap();
        transport.get_resource(FC).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(doc["resource"], FC);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.query(), Some("username=alice;api_key=s3cr3t"));
}

#[tokio::test]
async fn create_posts_json_body() {
    let server = MockServer::start().await;

    let body = json!({"timeseries": TS, "input_data": {"000001": 5}});
    Mock::given(method("POST"))
        .and(path("/forecast"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "resource": FC,
            "timeseries": TS,
            "status": {"code": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let created = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&config(&uri)).unwrap();
        let body: Document = body.as_object().cloned().unwrap();
        transport.create_resource("forecast", &body).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(created["resource"], FC);
}

#[tokio::test]
async fn list_appends_query_after_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"limit": 2, "total_count": 0},
            "objects": []
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let listing = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&config(&uri)).unwrap();
        transport.list_resources("forecast", "limit=2").unwrap()
    })
    .await
    .unwrap();

    assert_eq!(listing["meta"]["limit"], 2);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].url.query(),
        Some("username=alice;api_key=s3cr3t;limit=2")
    );
}

#[tokio::test]
async fn delete_with_empty_body_yields_empty_document() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/{FC}")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let uri = server.uri();
    let doc = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&config(&uri)).unwrap();
        transport.delete_resource(FC).unwrap()
    })
    .await
    .unwrap();

    assert!(doc.is_empty());
}

#[tokio::test]
async fn unauthorized_error_is_actionable_and_hides_the_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{FC}")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": 401,
            "status": {"code": -1100, "message": "Unauthorized use"}
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&config(&uri)).unwrap();
        transport.get_resource(FC).unwrap_err()
    })
    .await
    .unwrap();

    let msg = format!("{err:#}");
    assert!(msg.contains("authentication failed"));
    assert!(msg.contains("Unauthorized use"));
    assert!(!msg.contains("s3cr3t"));
}

#[tokio::test]
async fn non_json_error_body_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(format!("/{FC}")))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&config(&uri)).unwrap();
        transport.update_resource(FC, &Document::new()).unwrap_err()
    })
    .await
    .unwrap();

    let msg = err.to_string();
    assert!(msg.contains("502"));
    assert!(msg.contains("bad gateway"));
}

#[tokio::test]
async fn client_waits_for_time_series_then_creates_forecast() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{TS}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": TS,
            "status": {"code": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/forecast"))
        .and(body_json(json!({
            "name": "next week",
            "timeseries": TS,
            "input_data": {"000001": {"horizon": 7}}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "resource": FC,
            "status": {"code": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let created = tokio::task::spawn_blocking(move || {
        let client = ResourceClient::new(ResourceKind::FORECAST, config(&uri))
            .unwrap()
            .with_progress(false);
        let input = json!({"000001": {"horizon": 7}});
        let args = json!({"name": "next week"});
        let policy = PollingPolicy::new(std::time::Duration::from_millis(10), 3);
        client
            .create(TS, input.as_object(), args.as_object(), Some(policy))
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(created["resource"], FC);
}

#[tokio::test]
async fn client_surfaces_server_rejection_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/{FC}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 404,
            "status": {"code": -1201, "message": "Not found"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let client = ResourceClient::new(ResourceKind::FORECAST, config(&uri)).unwrap();
        client.get(FC).unwrap_err()
    })
    .await
    .unwrap();

    assert!(matches!(err, ResourceError::Transport(_)));
    assert!(err.to_string().contains("not found"));
}

/// Serves one `200 OK` that promises more body than it sends, then hangs up.
fn truncated_ok_server() -> (String, std::thread::JoinHandle<()>) {
    use std::io::{BufRead, BufReader, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}/", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
            line.clear();
        }
        let mut stream = stream;
        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"resource\":",
            )
            .unwrap();
        stream.flush().unwrap();
    });
    (uri, handle)
}

#[test]
fn body_cut_short_on_success_is_a_transport_failure() {
    let (uri, server) = truncated_ok_server();

    let client = ResourceClient::new(ResourceKind::FORECAST, config(&uri)).unwrap();
    let err = client.get(FC).unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, ResourceError::Transport(_)));
    let rendered = format!("{err:#}");
    assert!(rendered.contains("failed to read response body"), "{rendered}");
    assert!(!rendered.contains("s3cr3t"), "{rendered}");
}
