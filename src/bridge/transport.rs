//! Call envelopes and the client-to-executor transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, ProtocolError, Result};
use crate::types::CorrelationId;

/// One call crossing from client to executor
///
/// On the wire this is `{"channel": "...", "body": [id, arg0, arg1, ...]}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Channel named for the operation
    pub channel: String,
    /// Correlation id of the pending call
    pub id: CorrelationId,
    /// Operation arguments, in order
    pub args: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    channel: String,
    body: Vec<Value>,
}

impl Envelope {
    /// Serialize for transport
    pub fn to_wire(&self) -> Result<String> {
        let mut body = Vec::with_capacity(self.args.len() + 1);
        body.push(Value::from(self.id.get()));
        body.extend(self.args.iter().cloned());
        Ok(serde_json::to_string(&WireEnvelope {
            channel: self.channel.clone(),
            body,
        })?)
    }

    /// Parse a transported envelope
    pub fn from_wire(raw: &str) -> std::result::Result<Self, ProtocolError> {
        let wire: WireEnvelope = serde_json::from_str(raw)
            .map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
        let mut body = wire.body.into_iter();
        let id = body
            .next()
            .and_then(|first| first.as_u64())
            .ok_or_else(|| {
                ProtocolError::MalformedEnvelope("body must start with a correlation id".into())
            })?;
        Ok(Self {
            channel: wire.channel,
            id: CorrelationId::new(id),
            args: body.collect(),
        })
    }
}

/// Outbound half of the boundary
///
/// Posting is fire-and-forget, like a script message handler: it never waits
/// for the host to act on the envelope.
pub trait Transport: Send + Sync {
    /// Send one envelope to the executor
    fn post(&self, envelope: &Envelope) -> Result<()>;
}

/// In-process transport carrying serialized envelopes over a channel
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    /// Create a transport and the receiver the executor reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound, inbound) = mpsc::unbounded_channel();
        (Self { outbound }, inbound)
    }
}

impl Transport for ChannelTransport {
    fn post(&self, envelope: &Envelope) -> Result<()> {
        let wire = envelope.to_wire()?;
        self.outbound.send(wire).map_err(|_| Error::ShuttingDown)
    }
}
