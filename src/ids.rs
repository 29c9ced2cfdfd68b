/*
 * Copyright 2025 Paul Moore Parks and contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Transaction and line-item identifiers.
//!
//! `TransactionId` is a 128-bit value printed as 32 lowercase hex
//! characters. It is built deterministically from the handle allocated to
//! it (top 64 bits: a process-wide monotonic counter; bottom 64 bits: the
//! handle value itself) so that kernel behavior stays reproducible across
//! test runs without pulling in a randomness source.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u128);

impl TransactionId {
    pub(crate) fn from_parts(sequence: u64, handle: u64) -> Self {
        Self(((sequence as u128) << 64) | handle as u128)
    }

    pub fn as_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

/// A stable line-item identifier: `TXN_<tx_id_hex>_LN_<4-digit counter>`.
/// Assigned once at line creation and never reused within a transaction,
/// even if the line is later voided.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineItemId(String);

impl LineItemId {
    pub(crate) fn new(transaction_id: TransactionId, counter: u32) -> Self {
        Self(format!("TXN_{}_LN_{counter:04}", transaction_id.as_hex()))
    }

    /// Wraps a caller-supplied id string as-is, with no format validation.
    /// Used only to resolve an id passed in across the ABI; an id that
    /// doesn't match any line simply fails the lookup with `NotFound`.
    pub(crate) fn from_wire(raw: &str) -> Self {
        Self(raw.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 1-based, monotonic, never compacted - a line's number is assigned once
/// and preserved even if earlier lines are voided.
pub type LineNumber = u32;
