use crate::engine::notify::Notifier;
use crate::engine::ticket_api::{EventSource, FetchOutcome};
use crate::engine::types::EventId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sent {
    Relay {
        message: String,
        image: Option<String>,
    },
    Local {
        title: String,
        body: String,
        image: Option<String>,
    },
}

#[derive(Clone, Default)]
pub(crate) struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn relay_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Relay { .. }))
            .count()
    }

    pub(crate) fn local_count(&self) -> usize {
        self.sent()
            .iter()
            .filter(|s| matches!(s, Sent::Local { .. }))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn relay(&self, message: &str, image: Option<&str>) {
        self.sent.lock().unwrap().push(Sent::Relay {
            message: message.to_string(),
            image: image.map(str::to_string),
        });
    }

    fn local_alert(&self, title: &str, body: &str, image: Option<&str>) {
        self.sent.lock().unwrap().push(Sent::Local {
            title: title.to_string(),
            body: body.to_string(),
            image: image.map(str::to_string),
        });
    }
}

/// Source answering every fetch of an id with the outcome currently set for it.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSource {
    outcomes: Arc<Mutex<HashMap<EventId, (FetchOutcome, Option<Duration>)>>>,
    calls: Arc<Mutex<Vec<EventId>>>,
}

impl ScriptedSource {
    pub(crate) fn set(&self, id: EventId, outcome: FetchOutcome) {
        self.set_delayed(id, outcome, None);
    }

    pub(crate) fn set_status(&self, id: EventId, status: &str) {
        let body = format!(r#"{{"result":{{"button_text":"{status}","name":"Match {id}"}}}}"#);
        self.set(id, FetchOutcome::Body(body.into_bytes()));
    }

    pub(crate) fn set_delayed(&self, id: EventId, outcome: FetchOutcome, delay: Option<Duration>) {
        self.outcomes.lock().unwrap().insert(id, (outcome, delay));
    }

    pub(crate) fn calls(&self) -> Vec<EventId> {
        self.calls.lock().unwrap().clone()
    }
}

impl EventSource for ScriptedSource {
    fn fetch(&self, id: EventId) -> impl Future<Output = FetchOutcome> + Send {
        self.calls.lock().unwrap().push(id);
        let (outcome, delay) = self
            .outcomes
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or((FetchOutcome::Transport("unscripted".into()), None));
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) request_line: String,
    pub(crate) body: String,
}

type Route = fn(&str) -> (u16, &'static str);

/// Minimal HTTP/1.1 server on 127.0.0.1 answering each request from `route`
/// (keyed on the request line) and recording what it received.
pub(crate) struct LoopbackServer {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl LoopbackServer {
    pub(crate) async fn start(route: Route) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                tokio::spawn(answer(sock, route, Arc::clone(&log)));
            }
        });
        Self { addr, requests }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn answer(mut sock: TcpStream, route: Route, log: Arc<Mutex<Vec<RecordedRequest>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match sock.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };
    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        match sock.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let (code, reply) = route(&request_line);
    log.lock().unwrap().push(RecordedRequest {
        request_line,
        body: String::from_utf8_lossy(&buf[head_end..]).to_string(),
    });

    let reason = match code {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let resp = format!(
        "HTTP/1.1 {code} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
        reply.len()
    );
    let _ = sock.write_all(resp.as_bytes()).await;
    let _ = sock.shutdown().await;
}
