//! The assembled chat server.

use std::net::SocketAddr;

use tokio::task::JoinHandle;
use tracing::info;

use super::listener::ChatListener;
use super::session::{ClientSession, SessionConfig};
use crate::chat::{Processor, ProcessorHandle};
use crate::config::Config;
use crate::Result;

/// Listener plus the command processor it feeds.
pub struct ChatServer {
    listener: ChatListener,
    processor: ProcessorHandle,
    processor_task: JoinHandle<()>,
    session_config: SessionConfig,
}

impl ChatServer {
    /// Bind the listener and start the command processor.
    pub async fn bind(config: &Config) -> Result<Self> {
        let listener = ChatListener::bind(&config.server).await?;
        let (processor, processor_task) = Processor::spawn(&config.chat);

        info!(
            "History size {}, command queue {}, max connections {}",
            config.chat.history_size, config.chat.command_queue, config.server.max_connections
        );

        Ok(Self {
            listener,
            processor,
            processor_task,
            session_config: SessionConfig::from_config(config),
        })
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get a handle to the command processor.
    pub fn processor(&self) -> ProcessorHandle {
        self.processor.clone()
    }

    /// Accept and serve connections until the task is cancelled.
    pub async fn run(self) -> Result<()> {
        let Self {
            listener,
            processor,
            processor_task,
            session_config,
        } = self;

        let result = listener
            .run(move |stream, addr| {
                let session = ClientSession::new(addr.to_string(), processor.clone(), session_config);
                session.run(stream)
            })
            .await;

        processor_task.abort();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_server_serves_tcp_clients() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;

        let server = ChatServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let processor = server.processor();
        tokio::spawn(server.run());

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"/join lobby\n").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("Welcome to lobby")
        );

        let snapshot = processor.snapshot().await.unwrap();
        assert_eq!(snapshot.sessions, 1);
        assert_eq!(snapshot.room("lobby").unwrap().members, 1);
    }
}
