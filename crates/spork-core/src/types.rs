//! Shared data model for blocks, collections, transactions and events.
//!
//! These are the in-memory shapes exchanged with the transport layer and
//! returned to callers; serializing them to any particular wire format is the
//! caller's concern. Wire-visible fields are camelCase and identifiers travel
//! as lowercase hex strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 32-byte block / collection / transaction identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier(#[serde(with = "hex")] pub [u8; 32]);

impl Identifier {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", hex::encode(self.0))
    }
}

impl FromStr for Identifier {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// One network incarnation, as listed in the network configuration feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spork {
    /// Feed identifier; sporks are ordered by this, and root heights are
    /// monotone in identifier order.
    pub id: f64,
    pub name: String,
    pub root_height: u64,
    pub access_node: String,
}

/// A decoded event field (name/value pair), in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventField {
    pub name: String,
    pub value: String,
}

/// A single event emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub event_id: String,
    pub transaction_id: Identifier,
    pub transaction_index: u32,
    pub event_index: u32,
    #[serde(with = "hex")]
    pub payload: Vec<u8>,
    pub fields: Vec<EventField>,
}

/// Events of one block. `events` is ordered by
/// `(transaction_index, event_index)` ascending; callers rely on execution
/// order, so this is an invariant of every query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEvents {
    pub block_id: Identifier,
    pub height: u64,
    /// Block timestamp, seconds since the unix epoch.
    pub timestamp: u64,
    pub events: Vec<Event>,
}

/// A transaction that executed but failed. It contributes no events and is
/// reported alongside the event set rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTransaction {
    pub transaction_id: Identifier,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub block_id: Identifier,
    pub height: u64,
    pub timestamp: u64,
    pub collection_ids: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub transaction_ids: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub events: Vec<Event>,
    /// Present when the transaction executed with a runtime error.
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_hex_round_trip() {
        let id: Identifier = "aa".repeat(32).parse().unwrap();
        assert_eq!(id.to_string(), "aa".repeat(32));

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "aa".repeat(32)));
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_identifier_rejects_bad_length() {
        assert!("abcd".parse::<Identifier>().is_err());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event {
            event_type: "A.0x1.Token.Deposited".into(),
            event_id: "ev-0".into(),
            transaction_id: Identifier::new([7u8; 32]),
            transaction_index: 2,
            event_index: 5,
            payload: vec![0xde, 0xad],
            fields: vec![EventField {
                name: "amount".into(),
                value: "10.0".into(),
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "A.0x1.Token.Deposited");
        assert_eq!(json["transactionIndex"], 2);
        assert_eq!(json["payload"], "dead");
    }
}
