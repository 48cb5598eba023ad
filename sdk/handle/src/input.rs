//! Encrypted Input Builder
//!
//! Collects plaintexts destined for one (ledger, submitter) pair and checks
//! each against its declared bit width. Nothing here touches the network:
//! an out-of-range value is rejected before a gateway is ever called.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::HandleError;
use crate::handle::{AdmissionProof, CiphertextHandle};

/// Declared encrypted type of an input value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
}

impl ValueKind {
    pub fn bits(&self) -> u32 {
        match self {
            ValueKind::Bool => 1,
            ValueKind::U8 => 8,
            ValueKind::U16 => 16,
            ValueKind::U32 => 32,
            ValueKind::U64 => 64,
        }
    }

    /// Largest plaintext representable by this kind.
    pub fn max_value(&self) -> u64 {
        match self {
            ValueKind::U64 => u64::MAX,
            other => (1u64 << other.bits()) - 1,
        }
    }

    pub fn check(&self, value: u64) -> Result<(), HandleError> {
        if value > self.max_value() {
            return Err(HandleError::ValueOutOfRange { value, kind: *self });
        }
        Ok(())
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "ebool"),
            other => write!(f, "euint{}", other.bits()),
        }
    }
}

/// One validated plaintext slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputValue {
    pub kind: ValueKind,
    pub value: u64,
}

/// Plaintexts bound to a target ledger and submitter.
#[derive(Clone, Debug)]
pub struct EncryptedInput {
    ledger: Address,
    submitter: Address,
    values: Vec<InputValue>,
}

impl EncryptedInput {
    pub fn new(ledger: Address, submitter: Address) -> Self {
        Self {
            ledger,
            submitter,
            values: Vec::new(),
        }
    }

    pub fn ledger(&self) -> Address {
        self.ledger
    }

    pub fn submitter(&self) -> Address {
        self.submitter
    }

    pub fn values(&self) -> &[InputValue] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn add(&mut self, kind: ValueKind, value: u64) -> Result<&mut Self, HandleError> {
        kind.check(value)?;
        self.values.push(InputValue { kind, value });
        Ok(self)
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.values.push(InputValue {
            kind: ValueKind::Bool,
            value: value as u64,
        });
        self
    }

    pub fn add8(&mut self, value: u64) -> Result<&mut Self, HandleError> {
        self.add(ValueKind::U8, value)
    }

    pub fn add16(&mut self, value: u64) -> Result<&mut Self, HandleError> {
        self.add(ValueKind::U16, value)
    }

    pub fn add32(&mut self, value: u64) -> Result<&mut Self, HandleError> {
        self.add(ValueKind::U32, value)
    }

    pub fn add64(&mut self, value: u64) -> Result<&mut Self, HandleError> {
        self.add(ValueKind::U64, value)
    }
}

/// Gateway output: one handle per input slot plus one proof covering them all.
#[derive(Clone, Debug)]
pub struct EncryptedInputResponse {
    pub handles: Vec<CiphertextHandle>,
    pub proof: AdmissionProof,
}

impl EncryptedInputResponse {
    /// Handle of the first slot, the common single-value case.
    pub fn first(&self) -> Result<CiphertextHandle, HandleError> {
        self.handles.first().copied().ok_or(HandleError::EmptyInput)
    }
}
