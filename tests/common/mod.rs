//! Shared test infrastructure
//!
//! - Relay servers bound to port 0 in front of a wiremock upstream
//! - Small video payloads

#![allow(dead_code)]

use beyblade_arena::config::Config;
use beyblade_arena::server::Server;
use reqwest::multipart::{Form, Part};
use std::net::SocketAddr;
use std::time::Duration;

/// A running relay
pub struct TestRelay {
    pub addr: SocketAddr,
    _server_handle: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    /// Start a relay forwarding to `upstream_url`
    pub async fn start(upstream_url: &str, timeout_seconds: u64) -> Self {
        let mut config = Config::with_address("127.0.0.1:0");
        config.upstream.url = upstream_url.to_string();
        config.upstream.timeout_seconds = timeout_seconds;

        let server = Server::new(config).await.expect("Failed to create server");
        let addr = server.local_addr();

        let server_handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            addr,
            _server_handle: server_handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self._server_handle.abort();
    }
}

/// Minimal ISO base media header (`ftyp` box, `isom` brand) plus padding
pub fn mp4_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    bytes.extend_from_slice(b"isomiso2");
    bytes.resize(len.max(bytes.len()), 0x42);
    bytes
}

/// Multipart form with one video field
pub fn video_form(field: &str, file_name: &str, content: Vec<u8>) -> Form {
    let part = Part::bytes(content)
        .file_name(file_name.to_string())
        .mime_str("video/mp4")
        .expect("valid mime");
    Form::new().part(field.to_string(), part)
}
