//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Shared helpers for the chat integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use varidial_service::{ChatServer, MemoryDirectory, ServerConfig};

/// How long any expected output may take to show up
pub const WAIT: Duration = Duration::from_secs(5);

/// How long a client must stay quiet to count as silent
pub const QUIET: Duration = Duration::from_millis(250);

/// Directory used by most tests
pub fn directory() -> MemoryDirectory {
    MemoryDirectory::new()
        .with_user(100, "alice", "wonderland", 0)
        .with_user(200, "bob", "builder", 2)
        .with_user(300, "carol", "singer", 1)
        .with_user(400, "dave", "diver", 4)
        .with_user(500, "eve", "hidden", 7)
}

/// Loopback configuration with short timeouts
pub fn config() -> ServerConfig {
    ServerConfig::new("127.0.0.1:0".parse().unwrap())
        .with_shutdown_timeout(Duration::from_secs(2))
        .with_delivery_timeout(Duration::from_millis(200))
}

/// Start a server with the given configuration and directory
pub async fn start(config: ServerConfig, directory: MemoryDirectory) -> ChatServer {
    let server = ChatServer::new(config, Arc::new(directory)).await.unwrap();
    server.start().await.unwrap();
    server
}

/// Wait until a condition holds or fail the test
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Raw TCP chat client
pub struct TestClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    buffer: Vec<u8>,
}

impl TestClient {
    /// Connect to a server
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer,
            buffer: Vec::new(),
        }
    }

    /// Connect and log in, returning everything up to the help hint
    pub async fn login(addr: SocketAddr, number: u32, password: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.read_until("Enter your number: ").await;
        client.send(&number.to_string()).await;
        client.read_until("Enter your password: ").await;
        client.send(password).await;
        client.read_until("/? for help\r\n").await;
        client
    }

    /// Send a line terminated with CR LF
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// Send raw bytes
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Read until `pattern` has been seen and return the text through it
    pub async fn read_until(&mut self, pattern: &str) -> String {
        let needle = pattern.as_bytes();
        loop {
            if let Some(pos) = self
                .buffer
                .windows(needle.len())
                .position(|window| window == needle)
            {
                let rest = self.buffer.split_off(pos + needle.len());
                let found = std::mem::replace(&mut self.buffer, rest);
                return String::from_utf8_lossy(&found).into_owned();
            }

            let mut chunk = [0u8; 1024];
            let n = timeout(WAIT, self.reader.read(&mut chunk))
                .await
                .unwrap_or_else(|_| {
                    panic!(
                        "timed out waiting for {pattern:?}, have {:?}",
                        String::from_utf8_lossy(&self.buffer)
                    )
                })
                .unwrap();
            assert!(
                n > 0,
                "connection closed while waiting for {pattern:?}, have {:?}",
                String::from_utf8_lossy(&self.buffer)
            );
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Assert that nothing arrives for a short while
    pub async fn expect_silence(&mut self) {
        assert!(
            self.buffer.is_empty(),
            "unexpected buffered output {:?}",
            String::from_utf8_lossy(&self.buffer)
        );
        let mut chunk = [0u8; 256];
        if let Ok(result) = timeout(QUIET, self.reader.read(&mut chunk)).await {
            let n = result.unwrap();
            panic!(
                "expected silence, got {:?}",
                String::from_utf8_lossy(&chunk[..n])
            );
        }
    }

    /// Keep reading in the background and return the write half
    pub fn into_writer(self) -> OwnedWriteHalf {
        let mut reader = self.reader;
        tokio::spawn(async move {
            let mut sink = [0u8; 4096];
            while matches!(reader.read(&mut sink).await, Ok(n) if n > 0) {}
        });
        self.writer
    }

    /// Read everything until the server closes the connection
    pub async fn read_to_close(&mut self) -> String {
        let mut rest = Vec::new();
        timeout(WAIT, self.reader.read_to_end(&mut rest))
            .await
            .expect("server never closed the connection")
            .unwrap();
        let mut all = std::mem::take(&mut self.buffer);
        all.extend_from_slice(&rest);
        String::from_utf8_lossy(&all).into_owned()
    }
}
