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

//! Deterministic, in-process POS transaction kernel.
//!
//! The kernel owns transaction state, NRF line-item hierarchy, currency
//! arithmetic, and a process-wide handle registry. It never touches the
//! network, a database, or a clock; hosts drive it entirely through the
//! `extern "C"` surface in [`abi`]. Everything under `src/` other than
//! `abi` is plain Rust with no `unsafe` and no FFI awareness at all.

pub mod abi;
pub mod error;
pub mod ids;
pub mod line_item;
pub mod money;
pub mod registry;
pub mod transaction;
pub mod version;

pub use error::{KernelError, KernelResult, PkResult, ResultCode};
pub use ids::{LineItemId, LineNumber, TransactionId};
pub use line_item::LineItem;
pub use money::{CurrencyCode, Money};
pub use registry::{Handle as PkTransactionHandle, PK_INVALID_HANDLE};
pub use transaction::{LineItemPatch, Tender, TenderMethod, Transaction, TxState};
