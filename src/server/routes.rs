use std::path::Path;

use crate::server::static_files;

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn to_http_bytes(&self) -> Vec<u8> {
        let header = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len()
        );
        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    pub fn json(body: String) -> Self {
        HttpResponse {
            status_code: 200,
            status_text: "OK",
            content_type: "application/json",
            body: body.into_bytes(),
        }
    }
}

pub fn route_request(method: &str, path: &str, site_root: &Path) -> HttpResponse {
    match (method, path) {
        ("GET", "/api/health") => HttpResponse::json(health_payload()),
        (method, path) if method == "GET" && path.starts_with("/api/list") => {
            match static_files::listing_payload(path, site_root) {
                Ok(payload) => HttpResponse::json(payload),
                Err(err) => error_response(404, "Not Found", &err),
            }
        }
        ("GET", _) => match static_files::try_serve_static(path, site_root) {
            Some(response) => response,
            None => error_response(404, "Not Found", "no such file"),
        },
        _ => error_response(405, "Method Not Allowed", "only GET is supported"),
    }
}

fn health_payload() -> String {
    serde_json::json!({
        "status": "ok",
        "engine": "gallerist",
        "version": env!("CARGO_PKG_VERSION"),
    })
    .to_string()
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message }).to_string();
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: body.into_bytes(),
    }
}
