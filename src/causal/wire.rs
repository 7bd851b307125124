//! Wire messages exchanged between peers.
//!
//! Every message carries the sender's full vector clock plus either one
//! operation or one batch of a history sync. The encoding is JSON; field
//! names follow the logical schema (`vectorClock`, `happenedBefore`,
//! `referenceTimestamp`, `batchNumber`, ...).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::causal::vector_clock::VectorClock;
use crate::crdt::op::Operation;
use crate::error::Result;

/// One batch of a history sync for a newly joined peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatch<V> {
    pub batch_number: u64,
    pub last_batch_number: u64,
    pub operations: Vec<Operation<V>>,
}

impl<V> SyncBatch<V> {
    pub fn is_last(&self) -> bool {
        self.batch_number == self.last_batch_number
    }
}

/// The message payload, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Payload<V> {
    Operation(Operation<V>),
    Sync(SyncBatch<V>),
}

/// Envelope stamped with the sender's vector clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage<V> {
    pub vector_clock: VectorClock,
    pub payload: Payload<V>,
}

impl<V: Serialize + DeserializeOwned> WireMessage<V> {
    pub fn operation(vector_clock: VectorClock, operation: Operation<V>) -> Self {
        WireMessage {
            vector_clock,
            payload: Payload::Operation(operation),
        }
    }

    pub fn sync(vector_clock: VectorClock, batch: SyncBatch<V>) -> Self {
        WireMessage {
            vector_clock,
            payload: Payload::Sync(batch),
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a message; unknown message or operation kinds are rejected.
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::op::RemoveOp;
    use crate::crdt::types::Timestamp;

    #[test]
    fn test_operation_envelope_shape() {
        let mut vclock = VectorClock::new("a");
        vclock.increment();
        let op: Operation<char> = RemoveOp {
            timestamp: Timestamp::new("a", 3),
        }
        .into();

        let raw = WireMessage::operation(vclock, op).encode().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(json["vectorClock"]["site"], "a");
        assert_eq!(json["vectorClock"]["entries"][0]["clock"], 1);
        assert_eq!(
            json["payload"]["operation"]["remove"]["timestamp"]["clock"],
            3
        );
    }

    #[test]
    fn test_sync_envelope_shape() {
        let batch: SyncBatch<char> = SyncBatch {
            batch_number: 1,
            last_batch_number: 1,
            operations: vec![],
        };
        assert!(batch.is_last());

        let raw = WireMessage::sync(VectorClock::new("a"), batch)
            .encode()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["payload"]["sync"]["batchNumber"], 1);
        assert_eq!(json["payload"]["sync"]["lastBatchNumber"], 1);
    }

    #[test]
    fn test_unknown_payload_is_rejected() {
        let raw = r#"{"vectorClock":{"site":"a","entries":[]},"payload":{"presence":{}}}"#;
        let err = WireMessage::<char>::decode(raw).unwrap_err();
        assert!(err.is_protocol_violation());
    }
}
