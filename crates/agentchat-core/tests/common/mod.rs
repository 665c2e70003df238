//! Canned HTTP responder shared by the adapter tests.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// What the responder does with one connection.
pub enum Reply {
    Full(String),
    /// Write the bytes, then hold the connection open without answering.
    Stall(String, Duration),
}

pub struct Canned {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Canned {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn response(status: u16, content_type: &str, body: &str) -> Reply {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    };
    Reply::Full(format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        content_type,
        body.len(),
        body
    ))
}

pub fn json_response(status: u16, body: Value) -> Reply {
    response(status, "application/json", &body.to_string())
}

fn read_request(reader: &mut BufReader<TcpStream>) -> Recorded {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).unwrap();
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim().to_string();
            if name == "content-length" {
                content_length = value.parse().unwrap();
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).unwrap();
    Recorded {
        method,
        path,
        headers,
        body: String::from_utf8(body).unwrap(),
    }
}

/// Serve `replies` in order, one connection each.
pub fn serve(replies: Vec<Reply>) -> Canned {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&requests);
    thread::spawn(move || {
        for reply in replies {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            recorded.lock().unwrap().push(read_request(&mut reader));

            let mut stream = stream;
            match reply {
                Reply::Full(raw) => {
                    let _ = stream.write_all(raw.as_bytes());
                }
                Reply::Stall(raw, hold) => {
                    let _ = stream.write_all(raw.as_bytes());
                    let _ = stream.flush();
                    thread::sleep(hold);
                }
            }
        }
    });

    Canned { base_url, requests }
}
