//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves fixed bodies by request target (path plus query), answers 404 for
//! anything else and records every request with its Authorization header.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub target: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    body: Vec<u8>,
}

#[derive(Debug, Default, Clone)]
pub struct Routes {
    routes: HashMap<String, Route>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// 200 with `body` for `target` (e.g. `/files/F1` or `/api/users.list?limit=200`).
    pub fn ok(mut self, target: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(
            target.to_string(),
            Route {
                status: 200,
                body: body.into(),
            },
        );
        self
    }

    pub fn status(mut self, target: &str, status: u16) -> Self {
        self.routes.insert(
            target.to_string(),
            Route {
                status,
                body: Vec::new(),
            },
        );
        self
    }
}

pub struct FileServer {
    base: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FileServer {
    /// Base URL without trailing slash, e.g. `http://127.0.0.1:40000`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn url(&self, target: &str) -> String {
        format!("{}{}", self.base, target)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

/// Starts the server on a background thread; it runs until the process exits.
pub fn start(routes: Routes) -> FileServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_srv = Arc::clone(&seen);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let seen = Arc::clone(&seen_srv);
            thread::spawn(move || handle(stream, &routes, &seen));
        }
    });
    FileServer {
        base: format!("http://127.0.0.1:{}", port),
        seen,
    }
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
        if data.len() > 64 * 1024 {
            break;
        }
    }
    String::from_utf8(data).ok()
}

fn handle(mut stream: TcpStream, routes: &Routes, seen: &Mutex<Vec<SeenRequest>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(head) = read_head(&mut stream) else {
        return;
    };
    let mut lines = head.lines();
    let target = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("")
        .to_string();
    let authorization = lines
        .take_while(|l| !l.trim().is_empty())
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("authorization"))
        .map(|(_, value)| value.trim().to_string());
    seen.lock().unwrap().push(SeenRequest {
        target: target.clone(),
        authorization,
    });

    let (status, reason, body) = match routes.routes.get(&target) {
        Some(route) => (route.status, reason(route.status), route.body.as_slice()),
        None => (404, "Not Found", &[][..]),
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body);
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
