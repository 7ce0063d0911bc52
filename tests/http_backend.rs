use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use safecast_lib::broadcast::backend::HttpBackend;
use safecast_lib::broadcast::backend::wire::{
    CreateIncidentRequest, StartRecordingRequest, TokenRequest, TokenRole, UpdateIncidentRequest,
};
use safecast_lib::broadcast::backend::BroadcastBackend;
use safecast_lib::broadcast::errors::BackendError;
use safecast_lib::broadcast::types::RecordingType;

/// Serves exactly one request with a canned response and hands back the raw request.
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let lower = line.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&raw).to_string()
    });

    (url, server)
}

#[tokio::test]
async fn test_rtc_token_sends_bearer_and_json() {
    let (url, server) = serve_once(200, r#"{"token":"abc"}"#).await;
    let backend = HttpBackend::new(url, Some("secret".to_string())).unwrap();

    let response = backend
        .rtc_token(&TokenRequest {
            uid: 1,
            channel_name: "safecast".to_string(),
            role: TokenRole::Publisher,
        })
        .await
        .unwrap();

    assert_eq!(response.token, "abc");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/rtc-token HTTP/1.1"), "{}", request);
    assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
    assert!(request.contains(r#""channel_name":"safecast""#), "{}", request);
}

#[tokio::test]
async fn test_create_incident_accepts_numeric_id() {
    let (url, server) = serve_once(201, r#"{"id":42,"status":"open"}"#).await;
    let backend = HttpBackend::new(url, None).unwrap();

    let response = backend
        .create_incident(&CreateIncidentRequest {
            timestamp: Utc::now(),
            latitude: 40.4,
            longitude: -3.7,
            user: None,
            device_token: None,
        })
        .await
        .unwrap();

    assert_eq!(response.id, "42");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/incidents HTTP/1.1"));
    assert!(!request.to_ascii_lowercase().contains("authorization:"));
}

#[tokio::test]
async fn test_update_incident_patches_by_id() {
    let (url, server) = serve_once(200, r#"{"id":"42"}"#).await;
    let backend = HttpBackend::new(url, None).unwrap();

    backend
        .update_incident(
            "42",
            &UpdateIncidentRequest {
                recording_type: Some(RecordingType::Audio),
                finalized: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("PATCH /api/incidents/42 HTTP/1.1"), "{}", request);
    assert!(request.contains(r#""recording_type":"audio""#), "{}", request);
    assert!(!request.contains("video_url"));
}

#[tokio::test]
async fn test_start_recording_reads_resource_id() {
    let (url, _server) = serve_once(200, r#"{"resourceId":"res-9","sid":"sid-9"}"#).await;
    let backend = HttpBackend::new(url, None).unwrap();

    let response = backend
        .start_recording(&StartRecordingRequest {
            channel_name: "safecast".to_string(),
            recorder_uid: 999,
            token: "abc".to_string(),
            incident_id: "42".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.resource_id, "res-9");
    assert_eq!(response.sid, "sid-9");
}

#[tokio::test]
async fn test_error_status_keeps_body() {
    let (url, _server) = serve_once(503, r#"{"error":"maintenance"}"#).await;
    let backend = HttpBackend::new(url, None).unwrap();

    let result = backend
        .rtc_token(&TokenRequest {
            uid: 1,
            channel_name: "safecast".to_string(),
            role: TokenRole::Publisher,
        })
        .await;

    assert_eq!(
        result.unwrap_err(),
        BackendError::Status {
            status: 503,
            body: r#"{"error":"maintenance"}"#.to_string(),
        }
    );
}

#[tokio::test]
async fn test_undecodable_body_is_a_decode_error() {
    let (url, _server) = serve_once(200, "not json").await;
    let backend = HttpBackend::new(url, None).unwrap();

    let result = backend
        .rtc_token(&TokenRequest {
            uid: 1,
            channel_name: "safecast".to_string(),
            role: TokenRole::Publisher,
        })
        .await;

    assert!(matches!(result, Err(BackendError::Decode(_))));
}

#[tokio::test]
async fn test_unreachable_backend_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api", listener.local_addr().unwrap());
    drop(listener);

    let backend = HttpBackend::new(url, None).unwrap();
    let result = backend
        .rtc_token(&TokenRequest {
            uid: 1,
            channel_name: "safecast".to_string(),
            role: TokenRole::Publisher,
        })
        .await;

    assert!(matches!(result, Err(BackendError::Request(_))));
}
