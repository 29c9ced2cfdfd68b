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

//! The transaction aggregate: state machine, line-item hierarchy, tenders
//! and totals. This is the only place kernel-level business rules live;
//! the ABI layer (`abi.rs`) does nothing but translate pointers and error
//! codes around calls into this module.

use crate::error::{KernelError, KernelResult};
use crate::ids::{LineItemId, LineNumber, TransactionId};
use crate::line_item::{LineItem, LineItemTree};
use crate::money::{CurrencyCode, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TxState {
    Building = 0,
    Completed = 1,
    Voided = 2,
}

/// Tender method tag. The kernel only implements cash end-to-end; other
/// methods are a future host-layer extension and must not be silently
/// emulated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenderMethod {
    Cash,
}

#[derive(Debug, Clone, Copy)]
pub struct Tender {
    pub amount: Money,
    pub method: TenderMethod,
}

/// Optional per-field patch for `modify_line_item_by_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineItemPatch {
    pub new_quantity: Option<i32>,
    pub new_unit_price: Option<Money>,
}

#[derive(Debug)]
pub struct Transaction {
    pub id: TransactionId,
    pub store_name: String,
    pub currency: CurrencyCode,
    pub state: TxState,
    lines: LineItemTree,
    tenders: Vec<Tender>,
    line_id_counter: u32,
    sequence: u64,
}

impl Transaction {
    pub fn new(id: TransactionId, store_name: String, currency: CurrencyCode) -> Self {
        Self {
            id,
            store_name,
            currency,
            state: TxState::Building,
            lines: LineItemTree::new(),
            tenders: Vec::new(),
            line_id_counter: 0,
            sequence: 0,
        }
    }

    fn require_building(&self) -> KernelResult<()> {
        if self.state != TxState::Building {
            return Err(KernelError::InvalidState(format!(
                "transaction is {:?}, not Building",
                self.state
            )));
        }
        Ok(())
    }

    fn next_line_item_id(&mut self) -> LineItemId {
        self.line_id_counter += 1;
        LineItemId::new(self.id, self.line_id_counter)
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn validate_new_line(&self, quantity: i32, unit_price: &Money) -> KernelResult<()> {
        if quantity == 0 {
            return Err(KernelError::ValidationFailed("quantity must not be zero".into()));
        }
        if unit_price.currency != self.currency {
            return Err(KernelError::CurrencyMismatch);
        }
        Ok(())
    }

    /// Appends a root line item (no parent). Permits zero unit price
    /// (gifts, set components) and negative quantity (returns).
    pub fn add_line_item(
        &mut self,
        product_id: String,
        quantity: i32,
        unit_price: Money,
    ) -> KernelResult<LineItemId> {
        self.require_building()?;
        self.validate_new_line(quantity, &unit_price)?;

        let line_item_id = self.next_line_item_id();
        let created_at = self.next_sequence();
        self.lines.insert(LineItem {
            line_item_id: line_item_id.clone(),
            line_number: 0, // assigned by the tree on insert
            product_id,
            quantity,
            unit_price,
            parent_line_item_id: None,
            voided: false,
            void_reason: None,
            operator_id: None,
            created_at,
        });
        Ok(line_item_id)
    }

    /// Appends a child line item referencing `parent_line_number`.
    pub fn add_child_line_item(
        &mut self,
        product_id: String,
        quantity: i32,
        unit_price: Money,
        parent_line_number: LineNumber,
    ) -> KernelResult<LineItemId> {
        self.require_building()?;
        self.validate_new_line(quantity, &unit_price)?;
        self.lines.validate_parent(parent_line_number)?;

        let line_item_id = self.next_line_item_id();
        let created_at = self.next_sequence();
        self.lines.insert(LineItem {
            line_item_id: line_item_id.clone(),
            line_number: 0,
            product_id,
            quantity,
            unit_price,
            parent_line_item_id: Some(parent_line_number),
            voided: false,
            void_reason: None,
            operator_id: None,
            created_at,
        });
        Ok(line_item_id)
    }

    /// Appends a modification/child line item, resolving the parent by its
    /// stable line-item id rather than its (mutable-in-principle) line
    /// number.
    pub fn add_modification_by_line_item_id(
        &mut self,
        parent_line_item_id: &LineItemId,
        mod_sku: String,
        quantity: i32,
        unit_price: Money,
    ) -> KernelResult<LineItemId> {
        self.require_building()?;
        let parent_line_number = self
            .lines
            .find_by_id(parent_line_item_id)
            .ok_or_else(|| {
                KernelError::NotFound(format!("line item {parent_line_item_id} not found"))
            })?
            .line_number;
        self.add_child_line_item(mod_sku, quantity, unit_price, parent_line_number)
    }

    /// Cascading void by stable line-item id; see `LineItemTree::void_cascade`.
    pub fn void_line_item_by_id(
        &mut self,
        line_item_id: &LineItemId,
        reason: &str,
        operator_id: Option<String>,
    ) -> KernelResult<()> {
        self.require_building()?;
        let line_number = self
            .lines
            .find_by_id(line_item_id)
            .ok_or_else(|| KernelError::NotFound(format!("line item {line_item_id} not found")))?
            .line_number;
        self.lines.void_cascade(line_number, reason)?;
        if let Some(op) = operator_id {
            // descriptive only; the kernel never validates operator identity
            tracing::debug!(line_item_id = %line_item_id, operator_id = %op, "void recorded");
        }
        Ok(())
    }

    pub fn modify_line_item_by_id(
        &mut self,
        line_item_id: &LineItemId,
        patch: LineItemPatch,
    ) -> KernelResult<()> {
        self.require_building()?;
        if let Some(price) = patch.new_unit_price {
            if price.currency != self.currency {
                return Err(KernelError::CurrencyMismatch);
            }
        }
        self.lines.update_by_id(line_item_id, patch.new_quantity, patch.new_unit_price)
    }

    /// Appends a cash tender. Transitions to `Completed` once cumulative
    /// tendered amount reaches the transaction total.
    pub fn add_cash_tender(&mut self, amount: Money) -> KernelResult<()> {
        self.require_building()?;
        if amount.currency != self.currency {
            return Err(KernelError::CurrencyMismatch);
        }
        if amount.minor_units < 0 {
            return Err(KernelError::ValidationFailed("tender amount must not be negative".into()));
        }

        let total = self.total()?;
        let tendered = self.tendered()?.add(&amount)?;

        self.tenders.push(Tender { amount, method: TenderMethod::Cash });
        if tendered.minor_units >= total.minor_units {
            self.state = TxState::Completed;
        }
        Ok(())
    }

    pub fn void_transaction(&mut self) -> KernelResult<()> {
        if self.state != TxState::Building {
            return Err(KernelError::InvalidState(format!(
                "cannot void a transaction already {:?}",
                self.state
            )));
        }
        self.state = TxState::Voided;
        Ok(())
    }

    pub fn total(&self) -> KernelResult<Money> {
        let mut total = Money::zero(self.currency);
        for line in self.lines.iter().filter(|l| !l.voided) {
            total = total.add(&line.extended_price()?)?;
        }
        Ok(total)
    }

    pub fn tendered(&self) -> KernelResult<Money> {
        let mut tendered = Money::zero(self.currency);
        for tender in &self.tenders {
            tendered = tendered.add(&tender.amount)?;
        }
        Ok(tendered)
    }

    pub fn change_due(&self) -> KernelResult<Money> {
        let total = self.total()?;
        let tendered = self.tendered()?;
        let change = tendered.subtract(&total)?;
        Ok(if change.minor_units > 0 { change } else { Money::zero(self.currency) })
    }

    pub fn get_totals(&self) -> KernelResult<(Money, Money, Money, TxState)> {
        Ok((self.total()?, self.tendered()?, self.change_due()?, self.state))
    }

    /// Count of all lines including voided rows, retained for audit.
    pub fn line_count(&self) -> u32 {
        self.lines.len() as u32
    }

    pub fn line_item(&self, line_number: LineNumber) -> KernelResult<&LineItem> {
        self.lines
            .find_by_number(line_number)
            .ok_or_else(|| KernelError::NotFound(format!("line {line_number} not found")))
    }

    pub fn line_item_by_id(&self, id: &LineItemId) -> KernelResult<&LineItem> {
        self.lines
            .find_by_id(id)
            .ok_or_else(|| KernelError::NotFound(format!("line item {id} not found")))
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineItem> {
        self.lines.iter()
    }
}
