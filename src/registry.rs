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

//! Process-wide handle registry and terminal binding. One `RwLock` guards
//! both the handle map and every aggregate it owns, following the
//! teacher's `LEGAL_KERNEL_STORE: OnceLock<RwLock<LegalKernelStore>>`
//! pattern. `std::sync::RwLock` latches poisoned for the life of the
//! process once a panic escapes while held, which is exactly the
//! "terminal-error mode" this crate needs - no extra bookkeeping needed.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::error::{KernelError, KernelResult};
use crate::ids::TransactionId;
use crate::money::CurrencyCode;
use crate::transaction::Transaction;

pub type Handle = u64;
pub const PK_INVALID_HANDLE: Handle = 0;

#[derive(Default)]
pub struct Registry {
    terminal_id: Option<String>,
    next_handle: Handle,
    next_tx_sequence: u64,
    transactions: HashMap<Handle, Transaction>,
}

impl Registry {
    fn new() -> Self {
        Self { terminal_id: None, next_handle: 1, next_tx_sequence: 0, transactions: HashMap::new() }
    }

    pub fn initialize_terminal(&mut self, terminal_id: String) -> KernelResult<()> {
        if terminal_id.trim().is_empty() {
            return Err(KernelError::ValidationFailed("terminal id must not be empty".into()));
        }
        match &self.terminal_id {
            Some(existing) if existing != &terminal_id => {
                Err(KernelError::InvalidState(format!(
                    "terminal already initialized as {existing}"
                )))
            }
            _ => {
                self.terminal_id = Some(terminal_id);
                Ok(())
            }
        }
    }

    pub fn terminal_id(&self) -> Option<&str> {
        self.terminal_id.as_deref()
    }

    pub fn begin_transaction(
        &mut self,
        store_name: String,
        currency: CurrencyCode,
    ) -> Handle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.next_tx_sequence += 1;
        let id = TransactionId::from_parts(self.next_tx_sequence, handle);
        self.transactions.insert(handle, Transaction::new(id, store_name, currency));
        handle
    }

    pub fn get(&self, handle: Handle) -> KernelResult<&Transaction> {
        if handle == PK_INVALID_HANDLE {
            return Err(KernelError::NotFound("handle 0 is reserved as invalid".into()));
        }
        self.transactions
            .get(&handle)
            .ok_or_else(|| KernelError::NotFound(format!("no transaction for handle {handle}")))
    }

    pub fn get_mut(&mut self, handle: Handle) -> KernelResult<&mut Transaction> {
        if handle == PK_INVALID_HANDLE {
            return Err(KernelError::NotFound("handle 0 is reserved as invalid".into()));
        }
        self.transactions
            .get_mut(&handle)
            .ok_or_else(|| KernelError::NotFound(format!("no transaction for handle {handle}")))
    }

    pub fn close(&mut self, handle: Handle) -> KernelResult<()> {
        if self.transactions.remove(&handle).is_none() {
            return Err(KernelError::NotFound(format!("no transaction for handle {handle}")));
        }
        Ok(())
    }

    pub fn shutdown_terminal(&mut self) {
        self.transactions.clear();
        self.terminal_id = None;
    }
}

static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

pub fn registry() -> &'static RwLock<Registry> {
    REGISTRY.get_or_init(|| RwLock::new(Registry::new()))
}

/// Test-only reset hook so each test starts from a clean process-wide
/// registry. Production builds never call this - real hosts restart the
/// process to recover from a poisoned lock instead.
#[cfg(test)]
pub fn reset_for_test() {
    let mut guard = match registry().write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Registry::new();
}
