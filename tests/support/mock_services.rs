use std::{
    collections::{HashMap, HashSet},
    convert::Infallible,
    sync::{Arc, RwLock},
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A request the mock server received, reduced to what tests assert on.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub source_system: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct FeedEntry {
    id: u64,
    entity_id: String,
    term: String,
}

struct ServicesState {
    events: Vec<FeedEntry>,
    latest_id: Option<u64>,
    failing_pages: HashSet<u64>,
    entities: HashMap<String, Value>,
    directory_status: u16,
    directory_body: String,
    requests: Vec<RecordedRequest>,
}

/// Shared state behind the mock feed and directory endpoints.
#[derive(Clone)]
pub struct MockServices {
    inner: Arc<RwLock<ServicesState>>,
}

impl Default for MockServices {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServicesState {
                events: Vec::new(),
                latest_id: Some(0),
                failing_pages: HashSet::new(),
                entities: HashMap::new(),
                directory_status: 200,
                directory_body: String::new(),
                requests: Vec::new(),
            })),
        }
    }
}

impl MockServices {
    /// Adds a feed event and moves the latest id up to it.
    pub fn push_event(&self, id: u64, entity_id: &str, term: &str) {
        let mut inner = self.inner.write().expect("mock services poisoned");
        inner.events.push(FeedEntry {
            id,
            entity_id: entity_id.to_owned(),
            term: term.to_owned(),
        });
        inner.events.sort_by_key(|entry| entry.id);
        inner.latest_id = Some(inner.latest_id.unwrap_or(0).max(id));
    }

    pub fn set_latest_id(&self, latest_id: Option<u64>) {
        self.inner.write().expect("mock services poisoned").latest_id = latest_id;
    }

    pub fn fail_page(&self, cursor: u64) {
        self.inner
            .write()
            .expect("mock services poisoned")
            .failing_pages
            .insert(cursor);
    }

    pub fn insert_entity(&self, id: &str, details: Value) {
        self.inner
            .write()
            .expect("mock services poisoned")
            .entities
            .insert(id.to_owned(), details);
    }

    pub fn respond_to_directory(&self, status: u16, body: &str) {
        let mut inner = self.inner.write().expect("mock services poisoned");
        inner.directory_status = status;
        inner.directory_body = body.to_owned();
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner
            .read()
            .expect("mock services poisoned")
            .requests
            .clone()
    }

    pub fn directory_requests(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == Method::POST)
            .collect()
    }

    pub fn page_cursors(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .filter_map(|request| request.path.strip_prefix("/events/after/"))
            .filter_map(|cursor| cursor.parse().ok())
            .collect()
    }

    fn record(&self, request: RecordedRequest) {
        self.inner
            .write()
            .expect("mock services poisoned")
            .requests
            .push(request);
    }

    fn page(&self, cursor: u64, limit: usize) -> Option<Vec<FeedEntry>> {
        let inner = self.inner.read().expect("mock services poisoned");
        if inner.failing_pages.contains(&cursor) {
            return None;
        }
        Some(
            inner
                .events
                .iter()
                .filter(|entry| entry.id >= cursor)
                .take(limit)
                .cloned()
                .collect(),
        )
    }

    fn latest(&self) -> Option<FeedEntry> {
        let inner = self.inner.read().expect("mock services poisoned");
        let latest_id = inner.latest_id?;
        Some(
            inner
                .events
                .iter()
                .find(|entry| entry.id == latest_id)
                .cloned()
                .unwrap_or_else(|| FeedEntry {
                    id: latest_id,
                    entity_id: "latest".to_owned(),
                    term: "Created".to_owned(),
                }),
        )
    }

    fn entity(&self, id: &str) -> Option<Value> {
        self.inner
            .read()
            .expect("mock services poisoned")
            .entities
            .get(id)
            .cloned()
    }

    fn directory_response(&self) -> (u16, String) {
        let inner = self.inner.read().expect("mock services poisoned");
        (inner.directory_status, inner.directory_body.clone())
    }
}

pub struct MockServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    pub async fn start(services: MockServices) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let services = services.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(services.clone(), req)))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(
    services: MockServices,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let query = req.uri().query().map(str::to_owned);
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    let source_system = header("x-source-system");
    let authorization = header("authorization");

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return Ok(respond(
                StatusCode::BAD_REQUEST,
                format!("failed to read body: {err}"),
            ))
        }
    };
    let body = serde_json::from_slice::<Value>(&bytes).ok();

    services.record(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        source_system,
        authorization,
        body,
    });

    let limit = query
        .as_deref()
        .and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("limit="))
        })
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(100);

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/events") => match services.latest() {
            Some(entry) => atom(render_feed(&[entry])),
            None => respond(StatusCode::SERVICE_UNAVAILABLE, "feed offline".to_owned()),
        },
        (&Method::GET, path) if path.starts_with("/events/after/") => {
            let cursor = path
                .trim_start_matches("/events/after/")
                .parse::<u64>()
                .ok();
            match cursor.and_then(|cursor| services.page(cursor, limit)) {
                Some(entries) if entries.is_empty() => atom(String::new()),
                Some(entries) => atom(render_feed(&entries)),
                None => respond(StatusCode::BAD_GATEWAY, "upstream page failed".to_owned()),
            }
        }
        (&Method::GET, path) if path.starts_with("/entities/") => {
            match services.entity(path.trim_start_matches("/entities/")) {
                Some(details) => json_response(details),
                None => respond(StatusCode::NOT_FOUND, "no such entity".to_owned()),
            }
        }
        (&Method::POST, "/entities") | (&Method::POST, "/entities/deactivate") => {
            let (status, body) = services.directory_response();
            respond(
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body,
            )
        }
        _ => respond(StatusCode::NOT_FOUND, format!("unknown route {path}")),
    };
    Ok(response)
}

fn render_feed(entries: &[FeedEntry]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>people changes</title>
"#,
    );
    for entry in entries {
        xml.push_str(&format!(
            r#"  <entry>
    <id>{id}</id>
    <updated>2024-03-01T09:59:00Z</updated>
    <category term="{term}" />
    <content type="application/xml">
      <myMobilityUser>
        <Id>{entity}</Id>
        <Uri>https://feed.example/entities/{entity}</Uri>
      </myMobilityUser>
    </content>
  </entry>
"#,
            id = entry.id,
            term = entry.term,
            entity = entry.entity_id,
        ));
    }
    xml.push_str("</feed>\n");
    xml
}

fn atom(body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/atom+xml"),
    );
    response
}

fn json_response(value: Value) -> Response<Body> {
    let mut response = Response::new(Body::from(value.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

fn respond(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}
