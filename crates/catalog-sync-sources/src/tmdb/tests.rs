use super::*;
use crate::scraper::LookupScraper;
use crate::traits::{AddRequest, RemoteListAdapter, ReorderMove};
use catalog_sync_models::{TitleKey, TmdbMediaType};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Request line plus body of one request seen by the mock server
#[derive(Debug, Clone)]
struct Recorded {
    request_line: String,
    body: String,
}

/// Serves the scripted `(status, body)` replies in order, one per connection
async fn mock_server(replies: Vec<(u16, &'static str)>) -> (String, Arc<Mutex<Vec<Recorded>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let seen = recorded.clone();

    tokio::spawn(async move {
        for (status, body) in replies {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let request = read_request(&mut socket).await;
            seen.lock().unwrap().push(request);
            let response = format!(
                "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), recorded)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Recorded {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break buffer.len();
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    while buffer.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    Recorded {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buffer[header_end..]).to_string(),
    }
}

fn add(key: &str, id: &str) -> AddRequest {
    AddRequest {
        key: key.into(),
        external_id: id.to_string(),
    }
}

const EMPTY_PAGE: &str = r#"{"page":1,"results":[],"total_pages":0,"total_results":0}"#;

#[test]
fn test_parse_external_id() {
    assert_eq!(parse_external_id("movie:603"), Some((TmdbMediaType::Movie, 603)));
    assert_eq!(parse_external_id("tv:1399"), Some((TmdbMediaType::Tv, 1399)));
    assert_eq!(parse_external_id("person:1"), None);
    assert_eq!(parse_external_id("tt0133093"), None);
}

#[tokio::test]
async fn test_open_session_without_token_sends_nothing() {
    let (base, recorded) = mock_server(vec![]).await;
    let mut adapter = TmdbListAdapter::new(base, "8301936", None);
    let err = adapter.open_session().await.unwrap_err();
    assert!(matches!(err, SourceError::SessionAcquisition(_)));
    assert!(recorded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_open_session_rejected_token() {
    let (base, _) = mock_server(vec![(401, r#"{"success":false,"status_code":7}"#)]).await;
    let mut adapter = TmdbListAdapter::new(base, "8301936", Some("bad".to_string()));
    let err = adapter.open_session().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_add_batch_partial_success() {
    let (base, recorded) = mock_server(vec![
        (200, EMPTY_PAGE),
        (
            200,
            r#"{"success":true,"status_code":1,"results":[
                {"media_type":"movie","media_id":603,"success":true},
                {"media_type":"tv","media_id":1399,"success":false}
            ]}"#,
        ),
    ])
    .await;
    let mut adapter = TmdbListAdapter::new(base, "8301936", Some("token".to_string()));
    adapter.open_session().await.unwrap();

    let outcome = adapter
        .add_batch(&[add("The Matrix|1999", "movie:603"), add("Game of Thrones|2011", "tv:1399")])
        .await;
    assert!(outcome.error.is_none());
    assert_eq!(outcome.confirmed, vec![(TitleKey::from("The Matrix|1999"), "movie:603".to_string())]);
    assert_eq!(outcome.refused, vec![TitleKey::from("Game of Thrones|2011")]);

    let requests = recorded.lock().unwrap();
    assert_eq!(requests[1].request_line, "POST /4/list/8301936/items HTTP/1.1");
    let body: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(body["items"][0]["media_type"], "movie");
    assert_eq!(body["items"][0]["media_id"], 603);
    assert_eq!(body["items"][1]["media_type"], "tv");
}

#[tokio::test]
async fn test_add_batch_server_error_is_transient() {
    let (base, _) = mock_server(vec![(200, EMPTY_PAGE), (503, "{}")]).await;
    let mut adapter = TmdbListAdapter::new(base, "1", Some("token".to_string()));
    adapter.open_session().await.unwrap();

    let outcome = adapter.add_batch(&[add("The Matrix|1999", "movie:603")]).await;
    assert!(outcome.confirmed.is_empty());
    assert!(outcome.error.as_ref().is_some_and(|e| e.is_transient()));
}

#[tokio::test]
async fn test_delete_batch_sends_delete() {
    let (base, recorded) = mock_server(vec![
        (200, EMPTY_PAGE),
        (200, r#"{"success":true,"status_code":13,"results":[{"media_type":"movie","media_id":603,"success":true}]}"#),
    ])
    .await;
    let mut adapter = TmdbListAdapter::new(base, "1", Some("token".to_string()));
    adapter.open_session().await.unwrap();
    let outcome = adapter.delete_batch(&["movie:603".to_string()]).await;
    assert!(outcome.is_complete());
    assert_eq!(outcome.confirmed, vec!["movie:603".to_string()]);

    let requests = recorded.lock().unwrap();
    assert_eq!(requests[1].request_line, "DELETE /4/list/1/items HTTP/1.1");
}

#[tokio::test]
async fn test_delete_batch_confirms_only_removed_items() {
    let (base, _) = mock_server(vec![
        (200, EMPTY_PAGE),
        (
            200,
            r#"{"success":false,"status_code":13,"results":[
                {"media_type":"movie","media_id":1,"success":true},
                {"media_type":"movie","media_id":2,"success":false}
            ]}"#,
        ),
    ])
    .await;
    let mut adapter = TmdbListAdapter::new(base, "1", Some("token".to_string()));
    adapter.open_session().await.unwrap();

    let outcome = adapter
        .delete_batch(&["movie:1".to_string(), "movie:2".to_string(), "tv:3".to_string()])
        .await;
    assert_eq!(outcome.confirmed, vec!["movie:1".to_string()]);
    assert_eq!(outcome.refused, vec!["movie:2".to_string()]);
    assert!(matches!(outcome.error, Some(SourceError::UnknownOutcome(_))));
    assert!(!outcome.is_complete());
}

#[tokio::test]
async fn test_delete_batch_refused_envelope_confirms_nothing() {
    let (base, _) = mock_server(vec![
        (200, EMPTY_PAGE),
        (200, r#"{"success":false,"status_code":34,"status_message":"not found"}"#),
    ])
    .await;
    let mut adapter = TmdbListAdapter::new(base, "1", Some("token".to_string()));
    adapter.open_session().await.unwrap();

    let outcome = adapter.delete_batch(&["movie:1".to_string()]).await;
    assert!(outcome.confirmed.is_empty());
    assert_eq!(outcome.error.map(|e| e.category()), Some("rejected"));
}

#[tokio::test]
async fn test_clear_and_reorder() {
    let (base, _) = mock_server(vec![(200, EMPTY_PAGE), (200, r#"{"success":true,"status_code":1}"#)]).await;
    let mut adapter = TmdbListAdapter::new(base, "1", Some("token".to_string()));
    adapter.open_session().await.unwrap();
    adapter.clear().await.unwrap();

    assert!(!adapter.supports_reorder());
    let err = adapter
        .reorder(&[ReorderMove {
            remote_item_id: "movie:603".to_string(),
            position: 1,
        }])
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Unsupported(..)));
}

#[tokio::test]
async fn test_first_and_last_across_pages() {
    let (base, recorded) = mock_server(vec![
        (200, EMPTY_PAGE),
        (
            200,
            r#"{"page":1,"results":[{"id":603,"media_type":"movie"},{"id":604,"media_type":"movie"}],"total_pages":3,"total_results":45}"#,
        ),
        (200, r#"{"page":3,"results":[{"id":10,"media_type":"movie"},{"id":1399,"media_type":"tv"}],"total_pages":3,"total_results":45}"#),
    ])
    .await;
    let mut adapter = TmdbListAdapter::new(base, "1", Some("token".to_string()));
    adapter.open_session().await.unwrap();

    let anchors = adapter.first_and_last_remote_ids().await.unwrap().unwrap();
    assert_eq!(anchors.first, "movie:603");
    assert_eq!(anchors.last, "tv:1399");
    assert!(recorded.lock().unwrap()[2].request_line.contains("page=3"));
}

#[tokio::test]
async fn test_first_and_last_on_empty_list() {
    let (base, _) = mock_server(vec![(200, EMPTY_PAGE), (200, EMPTY_PAGE)]).await;
    let mut adapter = TmdbListAdapter::new(base, "1", Some("token".to_string()));
    adapter.open_session().await.unwrap();
    assert!(adapter.first_and_last_remote_ids().await.unwrap().is_none());
}

#[tokio::test]
async fn test_lookup_prefers_movie_then_episode_show() {
    let (base, recorded) = mock_server(vec![
        (200, r#"{"movie_results":[{"id":603}],"tv_results":[{"id":1}],"tv_episode_results":[]}"#),
        (200, r#"{"movie_results":[],"tv_results":[],"tv_episode_results":[{"id":63056,"show_id":1399}]}"#),
        (200, r#"{"movie_results":[],"tv_results":[],"tv_episode_results":[]}"#),
    ])
    .await;
    let mut lookup = TmdbLookup::new(base, Some("key".to_string())).unwrap();

    let movie = lookup.fetch_lookup(&"tt0133093".to_string()).await.unwrap();
    assert_eq!(movie, catalog_sync_models::TmdbRecord::new(603, TmdbMediaType::Movie, "tt0133093"));

    let show = lookup.fetch_lookup(&"tt1480055".to_string()).await.unwrap();
    assert_eq!(show.tmdb_id, Some(1399));
    assert_eq!(show.media_type, Some(TmdbMediaType::Tv));

    let err = lookup.fetch_lookup(&"tt0000000".to_string()).await.unwrap_err();
    assert!(matches!(err, SourceError::LookupUnavailable(_)));

    let requests = recorded.lock().unwrap();
    let first = &requests[0].request_line;
    assert!(first.starts_with("GET /3/find/tt0133093?"));
    assert!(first.contains("external_source=imdb_id"));
}

#[test]
fn test_lookup_requires_api_key() {
    assert!(TmdbLookup::new("http://localhost", None).is_err());
    assert!(TmdbLookup::new("http://localhost", Some(String::new())).is_err());
}
