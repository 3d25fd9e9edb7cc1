//! In-process mock of the provider API for tests.

use http::StatusCode;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Request, Response};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Routes pipeline tracing into the test harness output. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct MockProviderBuilder {
    campaigns: Vec<Value>,
    contents: HashMap<String, Value>,
    reports: HashMap<String, Value>,
    listing_failures: Option<(u32, u16)>,
}

impl MockProviderBuilder {
    /// Adds a campaign to the listing page.
    pub fn campaign(mut self, campaign: Value) -> Self {
        self.campaigns.push(campaign);
        self
    }

    /// Registers the content payload for a campaign id.
    pub fn content(mut self, campaign_id: &str, content: Value) -> Self {
        self.contents.insert(campaign_id.to_string(), content);
        self
    }

    /// Registers the raw report payload for a campaign id.
    pub fn report(mut self, campaign_id: &str, report: Value) -> Self {
        self.reports.insert(campaign_id.to_string(), report);
        self
    }

    /// Answers the first `count` listing requests with `status` before
    /// serving the page normally.
    pub fn fail_listings(mut self, count: u32, status: u16) -> Self {
        self.listing_failures = Some((count, status));
        self
    }

    pub async fn spawn(self) -> MockProvider {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(State {
            campaigns: self.campaigns,
            contents: self.contents,
            reports: self.reports,
            listing_failures: Mutex::new(self.listing_failures),
            last_campaigns_query: Mutex::new(None),
        });

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);
                let state = accept_state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(state.respond(&req)) }
                    });

                    let _ = hyper_util::server::conn::auto::Builder::new(
                        hyper_util::rt::TokioExecutor::new(),
                    )
                    .serve_connection(io, service)
                    .await;
                });
            }
        });

        MockProvider { port, state }
    }
}

pub struct MockProvider {
    port: u16,
    state: Arc<State>,
}

impl MockProvider {
    pub fn builder() -> MockProviderBuilder {
        MockProviderBuilder::default()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Query string of the most recent campaign listing request.
    pub fn last_campaigns_query(&self) -> Option<String> {
        self.state.last_campaigns_query.lock().unwrap().clone()
    }
}

struct State {
    campaigns: Vec<Value>,
    contents: HashMap<String, Value>,
    reports: HashMap<String, Value>,
    listing_failures: Mutex<Option<(u32, u16)>>,
    last_campaigns_query: Mutex<Option<String>>,
}

impl State {
    fn respond(&self, req: &Request<Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            ["campaigns"] => {
                *self.last_campaigns_query.lock().unwrap() =
                    req.uri().query().map(String::from);
                if let Some(status) = self.take_listing_failure() {
                    return status_response(status);
                }
                json_response(&json!({"campaigns": self.campaigns}))
            }
            ["campaigns", id, "content"] => match self.contents.get(*id) {
                Some(content) => json_response(content),
                None => not_found(),
            },
            ["reports", id] => match self.reports.get(*id) {
                Some(report) => json_response(report),
                None => not_found(),
            },
            _ => not_found(),
        }
    }

    fn take_listing_failure(&self) -> Option<u16> {
        let mut failures = self.listing_failures.lock().unwrap();
        match failures.as_mut() {
            Some((remaining, status)) if *remaining > 0 => {
                *remaining -= 1;
                Some(*status)
            }
            _ => None,
        }
    }
}

fn json_response(value: &Value) -> Response<Full<Bytes>> {
    Response::builder()
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(serde_json::to_vec(value).unwrap())))
        .unwrap()
}

fn not_found() -> Response<Full<Bytes>> {
    status_response(StatusCode::NOT_FOUND.as_u16())
}

fn status_response(status: u16) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from_static(b"{}")))
        .unwrap()
}
