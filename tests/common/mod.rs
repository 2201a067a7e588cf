//! Test helpers for end-to-end tests.
//!
//! Provides TestClient and a helper that starts a server on a free port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use parlor::{ChatServer, Config, ProcessorHandle};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server under test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub processor: ProcessorHandle,
}

impl TestServer {
    /// Start a server on a free port with the default configuration.
    pub async fn start() -> Self {
        Self::start_with(Config::default()).await
    }

    /// Start a server on a free port, overriding host and port in `config`.
    pub async fn start_with(mut config: Config) -> Self {
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;

        let server = ChatServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let processor = server.processor();
        tokio::spawn(server.run());

        Self { addr, processor }
    }

    /// Connect a new client.
    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.addr).await.unwrap()
    }

    /// Wait until the processor reports `expected` sessions.
    pub async fn wait_for_sessions(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if self.processor.snapshot().await.unwrap().sessions == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session count never reached {expected}");
    }
}

/// Line-oriented test client.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect to the server at the given address.
    pub async fn connect(addr: SocketAddr) -> Result<Self, std::io::Error> {
        let (reader, writer) = TcpStream::connect(addr).await?.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    /// Send raw bytes to the server.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<(), std::io::Error> {
        self.writer.write_all(data).await?;
        self.writer.flush().await
    }

    /// Send a line (with LF) to the server.
    pub async fn send_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        self.send_raw(format!("{line}\n").as_bytes()).await
    }

    /// Receive one line, failing the test on timeout.
    ///
    /// Returns None once the server has closed the connection.
    pub async fn recv_line(&mut self) -> Option<String> {
        timeout(DEFAULT_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(None)
    }

    /// Receive the next line and assert its content.
    pub async fn expect_line(&mut self, expected: &str) {
        assert_eq!(self.recv_line().await.as_deref(), Some(expected));
    }

    /// Assert that nothing arrives within `duration`.
    pub async fn expect_silence(&mut self, duration: Duration) {
        if let Ok(line) = timeout(duration, self.lines.next_line()).await {
            panic!("expected silence, got {line:?}");
        }
    }

    /// Send a command and wait for its single-line reply.
    pub async fn command(&mut self, line: &str) -> String {
        self.send_line(line).await.unwrap();
        self.recv_line().await.expect("connection closed")
    }
}
