use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};

pub mod routes;
pub mod static_files;

pub fn run_server(bind_addr: &str, site_root: &Path) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    println!("gallerist server listening on http://{bind_addr}");
    println!("serving {}", site_root.display());

    let site_root = site_root.to_path_buf();
    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, &site_root) {
                    eprintln!("request error: {err}");
                }
            }
            Err(err) => eprintln!("connection failed: {err}"),
        }
    }

    Ok(())
}

fn handle_connection(stream: &mut TcpStream, site_root: &PathBuf) -> std::io::Result<()> {
    let mut buffer = [0_u8; 16_384];
    let bytes_read = stream.read(&mut buffer)?;
    if bytes_read == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    let request_line = request.lines().next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or("GET");
    let path = request_parts.next().unwrap_or("/");

    let response = routes::route_request(method, path, site_root).to_http_bytes();
    stream.write_all(&response)?;
    stream.flush()?;
    Ok(())
}
