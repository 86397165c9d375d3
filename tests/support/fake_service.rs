//! Minimal stand-in for the prediction/training service.

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    sync::{Arc, Mutex},
    thread,
};

use ressys::service::ServiceAddress;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

pub struct FakeService {
    pub address: ServiceAddress,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeService {
    /// Serve requests on a background thread until the test process ends.
    pub fn start(model_loaded: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake service");
        let port = listener.local_addr().expect("local addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    continue;
                };
                let Some(request) = read_request(&mut stream) else {
                    continue;
                };
                let (status, body) = respond(&request, model_loaded);
                recorded
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .push(request);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Self {
            address: ServiceAddress {
                host: "127.0.0.1".to_string(),
                port,
            },
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

fn respond(request: &RecordedRequest, model_loaded: bool) -> (&'static str, String) {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => (
            "200 OK",
            format!(r#"{{"status":"healthy","model_loaded":{model_loaded}}}"#),
        ),
        ("POST", "/train") => {
            let base = serde_json::from_str::<serde_json::Value>(&request.body)
                .ok()
                .and_then(|value| value["base_name"].as_str().map(str::to_string))
                .unwrap_or_default();
            (
                "200 OK",
                format!(
                    r#"{{"status":"success","message":"Training completed for {base}","accuracy":0.95}}"#
                ),
            )
        }
        ("POST", "/predict") => ("200 OK", r#""/tmp/Output/prediction_0001.txt""#.to_string()),
        ("POST", "/shutdown") => (
            "200 OK",
            r#"{"message":"Server shutting down..."}"#.to_string(),
        ),
        _ => ("404 Not Found", r#"{"detail":"Not Found"}"#.to_string()),
    }
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let read = stream.read(&mut buf).ok()?;
        if read == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..read]);
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let body_start = header_end + 4;
    while data.len() < body_start + content_length {
        let read = stream.read(&mut buf).ok()?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
    }
    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let body_end = data.len().min(body_start + content_length);
    let body = String::from_utf8_lossy(&data[body_start..body_end]).into_owned();
    Some(RecordedRequest { method, path, body })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
