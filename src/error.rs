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

//! Result codes and the internal error taxonomy that maps onto them.
//!
//! Display text for [`KernelError`] is for internal `tracing` diagnostics
//! only; it is never part of the ABI contract. Every ABI-facing function
//! returns a [`PkResult`] code, nothing more.

use std::fmt;

/// The closed set of outcomes every ABI function can report.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResultCode {
    Ok = 0,
    NotFound = 1,
    InvalidState = 2,
    ValidationFailed = 3,
    InsufficientBuffer = 4,
    CurrencyMismatch = 5,
    Overflow = 6,
    InternalError = 255,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct PkResult {
    pub code: i32,
    pub reserved: i32,
}

impl PkResult {
    pub(crate) fn ok() -> Self {
        Self { code: ResultCode::Ok as i32, reserved: 0 }
    }

    pub(crate) fn err(c: ResultCode) -> Self {
        Self { code: c as i32, reserved: 0 }
    }
}

/// Internal error taxonomy. Every variant corresponds to exactly one
/// [`ResultCode`] and never to anything else - the mapping in
/// `impl From<KernelError> for PkResult` is the single translation point
/// from typed errors to wire codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    NotFound(String),
    InvalidState(String),
    ValidationFailed(String),
    InsufficientBuffer { required: usize },
    CurrencyMismatch,
    Overflow,
    InternalError(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NotFound(msg) => write!(f, "not found: {msg}"),
            KernelError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            KernelError::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            KernelError::InsufficientBuffer { required } => {
                write!(f, "insufficient buffer, requires {required} bytes")
            }
            KernelError::CurrencyMismatch => write!(f, "currency mismatch"),
            KernelError::Overflow => write!(f, "integer overflow in money arithmetic"),
            KernelError::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for KernelError {}

impl From<&KernelError> for ResultCode {
    fn from(e: &KernelError) -> Self {
        match e {
            KernelError::NotFound(_) => ResultCode::NotFound,
            KernelError::InvalidState(_) => ResultCode::InvalidState,
            KernelError::ValidationFailed(_) => ResultCode::ValidationFailed,
            KernelError::InsufficientBuffer { .. } => ResultCode::InsufficientBuffer,
            KernelError::CurrencyMismatch => ResultCode::CurrencyMismatch,
            KernelError::Overflow => ResultCode::Overflow,
            KernelError::InternalError(_) => ResultCode::InternalError,
        }
    }
}

impl From<KernelError> for PkResult {
    fn from(e: KernelError) -> Self {
        let code = ResultCode::from(&e);
        match &e {
            KernelError::InternalError(msg) => tracing::error!(%msg, "kernel internal error"),
            KernelError::InsufficientBuffer { .. } => {} // recoverable by design, not logged
            other => tracing::debug!(%other, "kernel call rejected"),
        }
        PkResult::err(code)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
