//! Protocol negotiation over a stream.
//!
//! The dialer proposes its protocols one at a time, most preferred first, and the listener
//! accepts the first one it supports or rejects each in turn. Messages are bincode-encoded,
//! length-delimited frames.

use std::io;

use async_trait::async_trait;
use bincode::{Decode, Encode};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::core::{
    protocol::ProtocolId,
    traits::{Negotiator, Stream},
};

/// Negotiation message variants.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Negotiation {
    /// Sent by the dialer, proposes a protocol.
    Propose(ProtocolId),
    /// Sent by the listener, the proposed protocol is supported. It must carry the proposed id.
    Accept(ProtocolId),
    /// Sent by the listener, the proposed protocol isn't supported.
    Reject,
}

pub struct NegotiationCodec {
    codec: LengthDelimitedCodec,
}

impl NegotiationCodec {
    pub fn new() -> Self {
        Self {
            codec: LengthDelimitedCodec::new(),
        }
    }
}

impl Default for NegotiationCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NegotiationCodec {
    type Item = Negotiation;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let bytes = match self.codec.decode(src)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        match bincode::decode_from_slice(&bytes, bincode::config::standard()) {
            Ok((message, _length)) => Ok(Some(message)),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}

impl Encoder<Negotiation> for NegotiationCodec {
    type Error = io::Error;

    fn encode(&mut self, message: Negotiation, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match bincode::encode_to_vec(message, bincode::config::standard()) {
            Ok(bytes) => self.codec.encode(Bytes::from(bytes), dst),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }
}

// A stream framed with the negotiation codec, keeps the bytes read past the current frame.
struct Framed<'a> {
    stream: &'a mut dyn Stream,
    codec: NegotiationCodec,
    buf: BytesMut,
}

impl<'a> Framed<'a> {
    fn new(stream: &'a mut dyn Stream) -> Self {
        Self {
            stream,
            codec: NegotiationCodec::new(),
            buf: BytesMut::new(),
        }
    }

    async fn send(&mut self, message: Negotiation) -> io::Result<()> {
        let mut dst = BytesMut::new();
        self.codec.encode(message, &mut dst)?;
        self.stream.write_all(&dst).await?;
        self.stream.flush().await
    }

    async fn recv(&mut self) -> io::Result<Negotiation> {
        loop {
            if let Some(message) = self.codec.decode(&mut self.buf)? {
                return Ok(message);
            }

            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
        }
    }
}

/// Negotiates protocols with the [`Negotiation`] messages.
#[derive(Debug, Clone, Default)]
pub struct Multistream {
    // The protocols accepted when responding.
    supported: Vec<ProtocolId>,
}

impl Multistream {
    pub fn new(supported: Vec<ProtocolId>) -> Self {
        Self { supported }
    }

    /// Answers the proposals on `stream` until one of the supported protocols is proposed, and
    /// returns it.
    pub async fn respond(&self, stream: &mut dyn Stream) -> io::Result<ProtocolId> {
        let mut framed = Framed::new(stream);

        loop {
            match framed.recv().await? {
                Negotiation::Propose(protocol) if self.supported.contains(&protocol) => {
                    framed.send(Negotiation::Accept(protocol.clone())).await?;
                    return Ok(protocol);
                }
                Negotiation::Propose(_) => framed.send(Negotiation::Reject).await?,
                other => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unexpected {other:?} from the dialer"),
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl Negotiator for Multistream {
    async fn select_one_of(
        &self,
        protocols: &[ProtocolId],
        stream: &mut dyn Stream,
    ) -> io::Result<ProtocolId> {
        let mut framed = Framed::new(stream);

        for protocol in protocols {
            framed.send(Negotiation::Propose(protocol.clone())).await?;

            match framed.recv().await? {
                Negotiation::Accept(accepted) if &accepted == protocol => return Ok(accepted),
                Negotiation::Reject => continue,
                other => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unexpected {other:?} in response to {protocol}"),
                    ))
                }
            }
        }

        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "no protocol in common",
        ))
    }
}
