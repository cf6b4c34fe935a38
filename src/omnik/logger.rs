use crate::prelude::*;
use crate::omnik::packet::{Parser, DATA_FRAME_MIN_LEN};

use {
    bytes::{Bytes, BytesMut},
    futures::StreamExt,
    std::net::SocketAddr,
    std::time::Duration,
    tokio::io::AsyncWriteExt,
    tokio::net::TcpStream,
    tokio_util::codec::{Decoder, FramedRead},
};

/// Read buffer size; one logger frame fits comfortably.
pub const RECV_CHUNK_SIZE: usize = 1500;

/// Upper bound on buffered response bytes before giving up on the frame.
pub const MAX_RESPONSE_LEN: usize = 4096;

/// A response the logger sent back, with what `Parser::classify` made of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub classification: Classification,
    pub bytes: Bytes,
}

// ResponseCodec {{{
/// Accumulates bytes until they classify as terminal or data.
#[derive(Clone, Debug)]
pub struct ResponseCodec {
    max_len: usize,
}

impl Default for ResponseCodec {
    fn default() -> Self {
        Self::new(MAX_RESPONSE_LEN)
    }
}

impl ResponseCodec {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Decoder for ResponseCodec {
    type Item = Frame;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match Parser::classify(src) {
            Classification::Incomplete => {
                self.check_cap(src)?;
                Ok(None)
            }
            Classification::Data => {
                // a data frame is only complete once its declared length is in
                let len = Parser::declared_len(src)
                    .unwrap_or(DATA_FRAME_MIN_LEN)
                    .max(DATA_FRAME_MIN_LEN);
                if src.len() < len {
                    self.check_cap(src)?;
                    return Ok(None);
                }

                Ok(Some(Frame {
                    classification: Classification::Data,
                    bytes: src.split_to(len).freeze(),
                }))
            }
            classification => Ok(Some(Frame {
                classification,
                bytes: src.split().freeze(),
            })),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None if Parser::classify(buf) == Classification::Data => {
                warn!(
                    "connection closed after {} bytes of a {} byte data frame",
                    buf.len(),
                    Parser::declared_len(buf).unwrap_or_default()
                );
                Ok(Some(Frame {
                    classification: Classification::Data,
                    bytes: buf.split().freeze(),
                }))
            }
            None => bail!(Error::MalformedFrame(format!(
                "connection closed after {} bytes: {}",
                buf.len(),
                Utils::hex(buf)
            ))),
        }
    }
}

impl ResponseCodec {
    fn check_cap(&self, src: &BytesMut) -> Result<()> {
        if src.len() > self.max_len {
            bail!(Error::MalformedFrame(format!(
                "{} bytes received without a recognisable response",
                src.len()
            )));
        }
        Ok(())
    }
} // }}}

/// One TCP session with the logger.
#[derive(Debug)]
pub struct Connection {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    timeout: Duration,
}

impl Connection {
    /// Connects to the first resolved address that accepts within `timeout`.
    pub async fn open(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addrs: Vec<SocketAddr> = match tokio::time::timeout(
            timeout,
            tokio::net::lookup_host((host, port)),
        )
        .await
        {
            Ok(Ok(addrs)) => addrs.collect(),
            Ok(Err(e)) => bail!(Error::Connection(format!("unable to resolve {}: {}", host, e))),
            Err(_) => bail!(Error::Timeout(timeout)),
        };

        if addrs.is_empty() {
            bail!(Error::Connection(format!("{} resolved to no addresses", host)));
        }

        let mut last_err = None;
        for addr in addrs {
            info!("connecting to {} port {} ({})", host, port, addr);

            match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY: {}", e);
                    }
                    debug!("connected to {}", addr);

                    return Ok(Self {
                        stream: Some(stream),
                        peer: addr,
                        timeout,
                    });
                }
                Ok(Err(e)) => {
                    warn!("could not open socket to {}: {}", addr, e);
                    last_err = Some(Error::Connection(format!("{}: {}", addr, e)));
                }
                Err(_) => {
                    warn!("connection to {} timed out after {:?}", addr, timeout);
                    last_err = Some(Error::Timeout(timeout));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Connection(format!("unable to connect to {}", host)))
            .into())
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Sends `request` and reads until a terminal or data response is seen.
    pub async fn exchange(&mut self, request: &[u8]) -> Result<Frame> {
        let timeout = self.timeout;
        let peer = self.peer;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Connection(format!("connection to {} already closed", peer)))?;

        debug!("RAW sent Packet (len={}): {}", request.len(), Utils::hex(request));

        match tokio::time::timeout(timeout, stream.write_all(request)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => bail!(Error::Connection(format!("send to {} failed: {}", peer, e))),
            Err(_) => bail!(Error::Timeout(timeout)),
        }

        let mut framed = FramedRead::with_capacity(stream, ResponseCodec::default(), RECV_CHUNK_SIZE);

        let frame = match tokio::time::timeout(timeout, framed.next()).await {
            Err(_) => bail!(Error::Timeout(timeout)),
            Ok(None) => bail!(Error::Connection(format!(
                "{} closed the connection without responding",
                peer
            ))),
            Ok(Some(Err(e))) => return Err(Self::receive_error(e, peer)),
            Ok(Some(Ok(frame))) => frame,
        };

        debug!(
            "RAW received Packet (len={}): {}",
            frame.bytes.len(),
            Utils::hex(&frame.bytes)
        );

        Ok(frame)
    }

    /// Releases the socket. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("shutdown of {} failed: {}", self.peer, e);
            }
            debug!("connection to {} closed", self.peer);
        }
    }

    fn receive_error(err: anyhow::Error, peer: SocketAddr) -> anyhow::Error {
        if err.downcast_ref::<Error>().is_some() {
            return err;
        }

        match err.downcast_ref::<std::io::Error>() {
            Some(e) => Error::Connection(format!("receive from {} failed: {}", peer, e)).into(),
            None => err,
        }
    }
}
