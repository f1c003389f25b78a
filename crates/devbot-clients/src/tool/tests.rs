use super::*;
use mockito::{Matcher, Server, ServerGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

// ─── Fallback wiki ────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingWiki {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingWiki {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DevbotError::service("confluence", "direct api down"));
        }
        Ok(())
    }
}

#[async_trait]
impl Wiki for CountingWiki {
    async fn create_page(
        &self,
        space: &str,
        title: &str,
        html_body: &str,
        _parent_id: Option<&str>,
    ) -> Result<PageRef> {
        self.record()?;
        assert!(html_body.starts_with("<h1>"), "fallback receives converted html");
        Ok(PageRef {
            id: "77".into(),
            title: title.into(),
            url: format!("https://wiki.test/spaces/{space}/pages/77"),
        })
    }

    async fn get_page(&self, page: &str) -> Result<WikiPage> {
        self.record()?;
        Ok(WikiPage {
            id: page.into(),
            title: "direct".into(),
            text: "direct text".into(),
        })
    }

    async fn search(&self, _query: &str, _space: Option<&str>) -> Result<Vec<SearchHit>> {
        self.record()?;
        Ok(vec![SearchHit {
            title: "direct hit".into(),
            url: "https://wiki.test/pages/1".into(),
            space: "DEV".into(),
            excerpt: String::new(),
            last_modified: String::new(),
        }])
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────

fn tool_client(server: &ServerGuard, fallback: Arc<CountingWiki>) -> ToolClient {
    ToolClient::new(
        Client::new(),
        &format!("{}/v1/sse", server.url()),
        Some("mcp-key".into()),
        ConfluenceCredentials {
            url: "https://company.atlassian.net/wiki".into(),
            username: "bot@example.com".into(),
            api_token: "token".into(),
        },
        fallback,
        Duration::from_secs(300),
    )
    .unwrap()
}

fn search_call() -> ToolCall {
    ToolCall::Search {
        query: "authentication".into(),
        space: Some("DEV".into()),
    }
}

async fn mock_session(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/v1/sessions")
        .match_header("authorization", "Bearer mcp-key")
        .match_body(Matcher::Json(json!({
            "confluence_url": "https://company.atlassian.net/wiki",
            "username": "bot@example.com",
            "api_token": "token",
        })))
        .with_body(r#"{"session_id":"sess-1"}"#)
        .expect(1)
        .create_async()
        .await
}

/// Echo the request id back in an SSE event carrying `payload`.
async fn mock_sse(server: &mut ServerGuard, payload: Value, expect: usize) -> mockito::Mock {
    server
        .mock("POST", "/v1/sse")
        .match_header("x-session-id", "sess-1")
        .match_header("accept", "text/event-stream")
        .match_body(Matcher::PartialJson(json!({ "method": "tools/call" })))
        .with_header("content-type", "text/event-stream")
        .with_body_from_request(move |request| {
            let body: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
            let mut event = payload.clone();
            event["id"] = body["id"].clone();
            format!(
                "event: message\ndata: {{\"id\":\"other\",\"result\":{{}}}}\n\ndata: {event}\n\n"
            )
            .into_bytes()
        })
        .expect(expect)
        .create_async()
        .await
}

// ─── Bound path ───────────────────────────────────────────────────────────

#[tokio::test]
async fn bound_call_returns_remote_result() {
    let mut server = Server::new_async().await;
    let session = mock_session(&mut server).await;
    let sse = mock_sse(
        &mut server,
        json!({ "result": { "results": [
            { "title": "Auth", "url": "https://x/pages/1", "space": { "name": "Development" },
              "excerpt": "jwt", "lastModified": "2024-05-01" }
        ] } }),
        2,
    )
    .await;
    let fallback = Arc::new(CountingWiki::default());
    let client = tool_client(&server, fallback.clone());

    for _ in 0..2 {
        let ToolOutput::Search(hits) = client.run_tool(search_call()).await.unwrap() else {
            panic!("expected search output");
        };
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].space, "Development");
        assert_eq!(hits[0].last_modified, "2024-05-01");
    }

    session.assert_async().await;
    sse.assert_async().await;
    assert_eq!(fallback.calls(), 0);
    assert_eq!(client.state().await, SessionState::Bound { id: "sess-1".into() });
}

#[tokio::test]
async fn remote_get_page_flattens_content() {
    let mut server = Server::new_async().await;
    let _session = mock_session(&mut server).await;
    let _sse = mock_sse(
        &mut server,
        json!({ "result": { "content": "<h1>Auth</h1><p>Use JWT</p>", "title": "Auth 設計書" } }),
        1,
    )
    .await;
    let client = tool_client(&server, Arc::new(CountingWiki::default()));

    let output = client
        .run_tool(ToolCall::GetPage { page_id: "123".into() })
        .await
        .unwrap();
    assert_eq!(
        output,
        ToolOutput::Page(WikiPage {
            id: "123".into(),
            title: "Auth 設計書".into(),
            text: "Auth\nUse JWT".into(),
        })
    );
}

// ─── Degradation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_negotiation_degrades_permanently() {
    let mut server = Server::new_async().await;
    let session = server
        .mock("POST", "/v1/sessions")
        .with_status(500)
        .with_body("boom")
        .expect(1)
        .create_async()
        .await;
    let sse = server.mock("POST", "/v1/sse").expect(0).create_async().await;
    let fallback = Arc::new(CountingWiki::default());
    let client = tool_client(&server, fallback.clone());

    for _ in 0..3 {
        let output = client.run_tool(search_call()).await.unwrap();
        assert!(matches!(output, ToolOutput::Search(ref hits) if hits[0].title == "direct hit"));
    }

    session.assert_async().await;
    sse.assert_async().await;
    assert_eq!(fallback.calls(), 3);
    assert_eq!(client.state().await, SessionState::Degraded);
}

#[tokio::test]
async fn missing_session_id_degrades() {
    let mut server = Server::new_async().await;
    let session = server
        .mock("POST", "/v1/sessions")
        .with_body(r#"{"status":"ok"}"#)
        .expect(1)
        .create_async()
        .await;
    let fallback = Arc::new(CountingWiki::default());
    let client = tool_client(&server, fallback.clone());

    client.run_tool(search_call()).await.unwrap();
    client.run_tool(search_call()).await.unwrap();

    session.assert_async().await;
    assert_eq!(client.state().await, SessionState::Degraded);
    assert_eq!(fallback.calls(), 2);
}

#[tokio::test]
async fn concurrent_first_calls_negotiate_once() {
    let mut server = Server::new_async().await;
    let session = mock_session(&mut server).await;
    let _sse = mock_sse(&mut server, json!({ "result": { "results": [] } }), 2).await;
    let client = tool_client(&server, Arc::new(CountingWiki::default()));

    let (a, b) = tokio::join!(client.run_tool(search_call()), client.run_tool(search_call()));
    assert!(a.is_ok() && b.is_ok());
    session.assert_async().await;
}

// ─── Per-call fallback ────────────────────────────────────────────────────

#[tokio::test]
async fn error_event_falls_back_once() {
    let mut server = Server::new_async().await;
    let _session = mock_session(&mut server).await;
    let sse = mock_sse(
        &mut server,
        json!({ "error": { "code": -32000, "message": "tool exploded" } }),
        1,
    )
    .await;
    let fallback = Arc::new(CountingWiki::default());
    let client = tool_client(&server, fallback.clone());

    let output = client
        .run_tool(ToolCall::CreatePage {
            space_key: "DEV".into(),
            title: "Auth 設計書".into(),
            content: "# Auth\n\nbody".into(),
            parent_id: None,
        })
        .await
        .unwrap();

    sse.assert_async().await;
    assert_eq!(fallback.calls(), 1);
    let ToolOutput::Created(page) = output else {
        panic!("expected created page");
    };
    assert_eq!(page.url, "https://wiki.test/spaces/DEV/pages/77");
    // A failed call does not degrade the session.
    assert_eq!(client.state().await, SessionState::Bound { id: "sess-1".into() });
}

#[tokio::test]
async fn stream_without_matching_event_falls_back() {
    let mut server = Server::new_async().await;
    let _session = mock_session(&mut server).await;
    let _sse = server
        .mock("POST", "/v1/sse")
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"id\":\"someone-else\",\"result\":{}}\n\n")
        .create_async()
        .await;
    let fallback = Arc::new(CountingWiki::default());
    let client = tool_client(&server, fallback.clone());

    let output = client
        .run_tool(ToolCall::GetPage { page_id: "5".into() })
        .await
        .unwrap();
    assert!(matches!(output, ToolOutput::Page(ref p) if p.title == "direct"));
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn fallback_result_is_final() {
    let mut server = Server::new_async().await;
    let _session = mock_session(&mut server).await;
    let sse = server
        .mock("POST", "/v1/sse")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;
    let fallback = Arc::new(CountingWiki::failing());
    let client = tool_client(&server, fallback.clone());

    let err = client.run_tool(search_call()).await.unwrap_err();
    assert!(err.to_string().contains("direct api down"));
    sse.assert_async().await;
    assert_eq!(fallback.calls(), 1);
}

// ─── Decoding ─────────────────────────────────────────────────────────────

#[test]
fn sessions_url_is_sibling_of_endpoint() {
    let server_url = "https://mcp.atlassian.com/v1/sse";
    let client = ToolClient::new(
        Client::new(),
        server_url,
        None,
        ConfluenceCredentials {
            url: "u".into(),
            username: "n".into(),
            api_token: "t".into(),
        },
        Arc::new(CountingWiki::default()),
        Duration::from_secs(300),
    )
    .unwrap();
    assert_eq!(
        client.sessions_url().unwrap().as_str(),
        "https://mcp.atlassian.com/v1/sessions"
    );
}

#[test]
fn invalid_endpoint_is_config_error() {
    let result = ToolClient::new(
        Client::new(),
        "not a url",
        None,
        ConfluenceCredentials {
            url: "u".into(),
            username: "n".into(),
            api_token: "t".into(),
        },
        Arc::new(CountingWiki::default()),
        Duration::from_secs(1),
    );
    assert!(matches!(result, Err(DevbotError::Config(_))));
}

#[test]
fn match_event_ignores_other_ids_and_garbage() {
    assert!(match_event("a", "not json").is_none());
    assert!(match_event("a", r#"{"id":"b","result":1}"#).is_none());
    assert_eq!(match_event("a", r#"{"id":"a","result":1}"#).unwrap().unwrap(), json!(1));
    let err = match_event("a", r#"{"id":"a","error":{"message":"nope"}}"#)
        .unwrap()
        .unwrap_err();
    assert!(err.to_string().contains("nope"));
}

#[test]
fn create_page_output_requires_url() {
    let call = ToolCall::CreatePage {
        space_key: "DEV".into(),
        title: "T".into(),
        content: String::new(),
        parent_id: None,
    };
    assert!(decode_output(&call, json!({ "page_id": "1" })).is_err());
    let ToolOutput::Created(page) =
        decode_output(&call, json!({ "page_id": "1", "page_url": "https://x/pages/1" })).unwrap()
    else {
        panic!("expected created page");
    };
    assert_eq!(page.title, "T");
    assert_eq!(page.id, "1");
}
