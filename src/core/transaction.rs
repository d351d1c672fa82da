//! Transaction handling for the ledger
//!
//! A transaction is an ordered list of input records and output records,
//! each an opaque JSON object of scalar fields. Its identity is the SHA-256
//! of a canonical serialization that leaves the signature out, so the hash
//! is the same before and after signing.

use crate::crypto::{public_key_from_bytes, sha256_hex, verify_signature, KeyPair};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// An input or output record: field name to scalar value, keys kept sorted
pub type TxRecord = Map<String, Value>;

// =============================================================================
// Error Types
// =============================================================================

/// Structural problems with a transaction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Transaction has no inputs")]
    EmptyInputs,
    #[error("Transaction has no outputs")]
    EmptyOutputs,
    #[error("Unsupported field: {0}")]
    UnsupportedField(String),
    #[error("Invalid amount in field {0}")]
    InvalidAmount(String),
}

/// Failures while signing a transaction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SigningError {
    #[error("Cannot sign a transaction without inputs")]
    EmptyInputs,
    #[error("Cannot sign a transaction without outputs")]
    EmptyOutputs,
    #[error("Malformed private key")]
    MalformedKey,
    #[error("Private key does not match the transaction public key")]
    KeyMismatch,
}

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),
    #[error("Cannot decode transaction: {0}")]
    Deserialize(String),
}

/// Build a record from field/value pairs
pub fn record<I, K, V>(fields: I) -> TxRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

// =============================================================================
// Transaction
// =============================================================================

/// A ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ordered input records (source reference, amount, ...)
    pub inputs: Vec<TxRecord>,
    /// Ordered output records (destination, amount, ...)
    pub outputs: Vec<TxRecord>,
    /// Compressed secp256k1 public key of the signer
    #[serde(with = "hex_option")]
    pub public_key: Option<Vec<u8>>,
    /// Compact ECDSA signature over the transaction hash
    #[serde(with = "hex_option")]
    pub signature: Option<Vec<u8>>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Random value that diversifies the identity hash
    pub nonce: u64,
}

/// Shape of the canonical text accepted by [`Transaction::deserialize`]
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CanonicalPayload {
    inputs: Vec<TxRecord>,
    nonce: u64,
    outputs: Vec<TxRecord>,
    public_key: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a new unsigned transaction stamped with the current time
    pub fn new(inputs: Vec<TxRecord>, outputs: Vec<TxRecord>, public_key: Option<Vec<u8>>) -> Self {
        Self::from_parts(inputs, outputs, public_key, Utc::now(), rand::random())
    }

    /// Create a transaction with every hashed field given explicitly
    pub fn from_parts(
        inputs: Vec<TxRecord>,
        outputs: Vec<TxRecord>,
        public_key: Option<Vec<u8>>,
        timestamp: DateTime<Utc>,
        nonce: u64,
    ) -> Self {
        Self {
            inputs,
            outputs,
            public_key,
            signature: None,
            timestamp,
            nonce,
        }
    }

    /// Create the block reward transaction: no inputs, one output, unsigned
    pub fn reward(address: &str, amount: f64) -> Self {
        let output = record([
            ("address", Value::from(address)),
            ("amount", Value::from(amount)),
        ]);
        Self::new(Vec::new(), vec![output], None)
    }

    /// Whether this looks like a block reward transaction
    pub fn is_reward(&self) -> bool {
        self.inputs.is_empty() && self.outputs.len() == 1 && self.signature.is_none()
    }

    /// Canonical text of every field except the signature
    ///
    /// Compact JSON with sorted keys; the timestamp uses RFC 3339 with
    /// nanosecond precision so the text survives a round trip unchanged.
    pub fn serialize(&self) -> String {
        let mut payload = Map::new();
        payload.insert("inputs".into(), records_value(&self.inputs));
        payload.insert("nonce".into(), Value::from(self.nonce));
        payload.insert("outputs".into(), records_value(&self.outputs));
        payload.insert(
            "public_key".into(),
            self.public_key
                .as_ref()
                .map(|key| Value::String(hex::encode(key)))
                .unwrap_or(Value::Null),
        );
        payload.insert(
            "timestamp".into(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        Value::Object(payload).to_string()
    }

    /// Rebuild a transaction from its canonical text; the signature is absent
    pub fn deserialize(text: &str) -> Result<Self, TransactionError> {
        let payload: CanonicalPayload =
            serde_json::from_str(text).map_err(|e| TransactionError::Deserialize(e.to_string()))?;

        let public_key = payload
            .public_key
            .map(hex::decode)
            .transpose()
            .map_err(|e| TransactionError::Deserialize(e.to_string()))?;

        Ok(Self::from_parts(
            payload.inputs,
            payload.outputs,
            public_key,
            payload.timestamp,
            payload.nonce,
        ))
    }

    /// Identity hash: hex SHA-256 of the canonical serialization
    pub fn hash(&self) -> String {
        sha256_hex(self.serialize().as_bytes())
    }

    /// Check the structure required for mempool admission
    pub fn validate_structure(&self) -> Result<(), ValidationError> {
        if self.inputs.is_empty() {
            return Err(ValidationError::EmptyInputs);
        }
        if self.outputs.is_empty() {
            return Err(ValidationError::EmptyOutputs);
        }

        for rec in self.inputs.iter().chain(self.outputs.iter()) {
            for (field, value) in rec {
                if value.is_object() || value.is_array() {
                    return Err(ValidationError::UnsupportedField(field.clone()));
                }
                if field == "amount" && !value.as_f64().is_some_and(|a| a >= 0.0) {
                    return Err(ValidationError::InvalidAmount(field.clone()));
                }
            }
        }

        Ok(())
    }

    /// Sign the transaction hash with raw secp256k1 private key bytes
    ///
    /// A missing public key is filled in from the private key before hashing.
    pub fn sign(&mut self, private_key: &[u8]) -> Result<(), SigningError> {
        if self.inputs.is_empty() {
            return Err(SigningError::EmptyInputs);
        }
        if self.outputs.is_empty() {
            return Err(SigningError::EmptyOutputs);
        }

        let key_pair =
            KeyPair::from_private_key_bytes(private_key).map_err(|_| SigningError::MalformedKey)?;
        let derived = key_pair.public_key_bytes();

        match &self.public_key {
            Some(existing) if *existing != derived => return Err(SigningError::KeyMismatch),
            Some(_) => {}
            None => self.public_key = Some(derived),
        }

        let digest = hex::decode(self.hash()).map_err(|_| SigningError::MalformedKey)?;
        let signature = key_pair
            .sign(&digest)
            .map_err(|_| SigningError::MalformedKey)?;
        self.signature = Some(signature);
        Ok(())
    }

    /// Verify the stored signature; never fails, only reports
    pub fn verify_signature(&self) -> bool {
        let (Some(public_key), Some(signature)) = (&self.public_key, &self.signature) else {
            return false;
        };

        let Ok(public_key) = public_key_from_bytes(public_key) else {
            return false;
        };
        let Ok(digest) = hex::decode(self.hash()) else {
            return false;
        };

        verify_signature(&public_key, &digest, signature).unwrap_or(false)
    }

    /// Sum of the `amount` fields of outputs addressed to `address`
    pub fn amount_to(&self, address: &str) -> f64 {
        self.outputs
            .iter()
            .filter(|o| o.get("address").and_then(Value::as_str) == Some(address))
            .filter_map(|o| o.get("amount").and_then(Value::as_f64))
            .sum()
    }

    /// Sum of every output `amount`
    pub fn total_output(&self) -> f64 {
        self.outputs
            .iter()
            .filter_map(|o| o.get("amount").and_then(Value::as_f64))
            .sum()
    }
}

fn records_value(records: &[TxRecord]) -> Value {
    Value::Array(records.iter().cloned().map(Value::Object).collect())
}

/// Serde adapter storing optional byte strings as hex
mod hex_option {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| hex::decode(text).map_err(D::Error::custom))
            .transpose()
    }
}
