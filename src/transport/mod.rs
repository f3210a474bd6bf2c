// Message transports
// Where questions come from and where answers go

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout,
};

use crate::Result;

/// A question from one requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub requester_id: String,
    pub text: String,
}

#[async_trait]
pub trait Transport: Send {
    /// Next message, or `None` once the transport is closed
    async fn next_message(&mut self) -> Result<Option<IncomingMessage>>;

    async fn reply(&mut self, to: &IncomingMessage, text: &str) -> Result<()>;
}

/// Line-oriented transport with a single fixed requester
pub struct ConsoleTransport<R, W> {
    lines: Lines<BufReader<R>>,
    writer: W,
    requester_id: String,
}

impl ConsoleTransport<Stdin, Stdout> {
    #[inline]
    pub fn stdio(requester_id: impl Into<String>) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), requester_id)
    }
}

impl<R, W> ConsoleTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    #[inline]
    pub fn new(reader: R, writer: W, requester_id: impl Into<String>) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
            requester_id: requester_id.into(),
        }
    }

    #[inline]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<R, W> Transport for ConsoleTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    #[inline]
    async fn next_message(&mut self) -> Result<Option<IncomingMessage>> {
        while let Some(line) = self.lines.next_line().await? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            return Ok(Some(IncomingMessage {
                requester_id: self.requester_id.clone(),
                text: text.to_string(),
            }));
        }
        Ok(None)
    }

    #[inline]
    async fn reply(&mut self, _to: &IncomingMessage, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.write_all(b"\n\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
