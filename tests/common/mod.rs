//! Integration test infrastructure: an in-process server on an ephemeral
//! port and a line-oriented test client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use ferric_proto::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const PASSWORD: &str = "letmein";

/// An in-process ferricd instance.
pub struct TestServer {
    pub addr: SocketAddr,
}

impl TestServer {
    /// Bind on an ephemeral port and run the gateway in the background.
    pub async fn spawn() -> anyhow::Result<Self> {
        let config = ferricd::Config {
            port: 0,
            password: PASSWORD.to_string(),
            server: Default::default(),
            dcc: Default::default(),
        };
        let gateway = ferricd::bind(config).await?;
        let addr = gateway.local_addr()?;
        tokio::spawn(async move {
            let _ = gateway.run().await;
        });
        Ok(Self { addr })
    }

    pub async fn connect(&self) -> anyhow::Result<TestClient> {
        TestClient::connect(self.addr).await
    }
}

/// A line-oriented IRC test client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    /// Send one raw line; CR-LF is appended if missing.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if !line.ends_with("\r\n") {
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive one parsed message.
    pub async fn recv(&mut self) -> anyhow::Result<Message> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Message> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("connection closed");
        }
        Message::parse(line.trim_end_matches(['\r', '\n']))
            .map_err(|e| anyhow::anyhow!("parse error on {line:?}: {e}"))
    }

    /// Receive until the predicate matches; returns everything received,
    /// the matching message last.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<Message>>
    where
        F: FnMut(&Message) -> bool,
    {
        let mut messages = Vec::new();
        loop {
            let msg = self.recv().await?;
            let done = predicate(&msg);
            messages.push(msg);
            if done {
                return Ok(messages);
            }
        }
    }

    /// Complete the PASS/NICK/USER handshake and drain the welcome burst
    /// through 376.
    pub async fn register(&mut self, nick: &str) -> anyhow::Result<Vec<Message>> {
        self.send(&format!("PASS {PASSWORD}")).await?;
        self.send(&format!("NICK {nick}")).await?;
        self.send(&format!("USER {nick} 0 * :{nick}")).await?;
        self.recv_until(|m| m.command == "376").await
    }

    /// Drain messages until a JOIN confirmation cycle completes (366).
    pub async fn join(&mut self, channel: &str, key: Option<&str>) -> anyhow::Result<Vec<Message>> {
        match key {
            Some(key) => self.send(&format!("JOIN {channel} {key}")).await?,
            None => self.send(&format!("JOIN {channel}")).await?,
        }
        self.recv_until(|m| m.command == "366").await
    }
}
