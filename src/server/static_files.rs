//! Serve gallery files and JSON directory listings from the site root.
//! The corpus is plain files on disk; the editors fetch records and images
//! straight from here.

use std::fs;
use std::path::{Path, PathBuf};

use super::routes::HttpResponse;

/// Try to serve a file under the site root. Returns None when the path
/// escapes the root or names nothing servable.
pub fn try_serve_static(path: &str, site_root: &Path) -> Option<HttpResponse> {
    let relative = sanitize(path)?;
    let file_path = if relative.as_os_str().is_empty() {
        site_root.join("index.html")
    } else {
        site_root.join(&relative)
    };

    let file_path = if file_path.is_dir() {
        file_path.join("index.html")
    } else {
        file_path
    };
    if !file_path.is_file() {
        return None;
    }

    let body = fs::read(&file_path).ok()?;
    Some(HttpResponse {
        status_code: 200,
        status_text: "OK",
        content_type: content_type_for_path(&file_path),
        body,
    })
}

/// `GET /api/list?dir=<relative>` payload: entries of one directory as JSON.
pub fn listing_payload(path: &str, site_root: &Path) -> Result<String, String> {
    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
    let dir = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("dir="))
        .unwrap_or("");
    let relative = sanitize(dir).ok_or_else(|| "invalid directory".to_string())?;
    let dir_path = site_root.join(&relative);
    if !dir_path.is_dir() {
        return Err(format!("not a directory: {dir}"));
    }

    let mut entries = Vec::new();
    let listing = fs::read_dir(&dir_path).map_err(|err| err.to_string())?;
    for entry in listing.filter_map(Result::ok) {
        let name = entry.file_name().to_string_lossy().to_string();
        let metadata = entry.metadata().ok();
        let is_dir = metadata.as_ref().map_or(false, |m| m.is_dir());
        entries.push(serde_json::json!({
            "name": name,
            "kind": if is_dir { "dir" } else { "file" },
            "size": metadata.map(|m| m.len()).unwrap_or(0),
        }));
    }
    entries.sort_by(|a, b| {
        a["name"]
            .as_str()
            .unwrap_or("")
            .cmp(b["name"].as_str().unwrap_or(""))
    });

    serde_json::to_string(&serde_json::json!({ "dir": dir, "entries": entries }))
        .map_err(|err| err.to_string())
}

/// Strip the query, reject traversal, return the root-relative path.
fn sanitize(path: &str) -> Option<PathBuf> {
    let path = path.split('?').next().unwrap_or(path);
    let trimmed = path.trim_start_matches('/');
    if trimmed.contains("..") {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn content_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "html" => "text/html; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "webp" => "image/webp",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "txt" | "md" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
