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

//! The line-item tree (NRF parent/child hierarchy): ordered line items
//! with stable ids, monotonic line numbers, and cascading void. Used only
//! by the transaction aggregate - never exposed directly across the ABI.

use std::collections::HashMap;

use crate::error::{KernelError, KernelResult};
use crate::ids::{LineItemId, LineNumber};
use crate::money::Money;

#[derive(Debug, Clone)]
pub struct LineItem {
    pub line_item_id: LineItemId,
    pub line_number: LineNumber,
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: Money,
    pub parent_line_item_id: Option<LineNumber>,
    pub voided: bool,
    pub void_reason: Option<String>,
    pub operator_id: Option<String>,
    /// Logical insertion sequence, used only to break ties in audit
    /// ordering. Not a wall-clock timestamp - the kernel stays
    /// deterministic and reproducible across test runs.
    pub created_at: u64,
}

impl LineItem {
    pub fn extended_price(&self) -> KernelResult<Money> {
        self.unit_price.multiply(self.quantity as i64)
    }
}

/// Parent-pointing forest of line items: children know their parent by
/// line number, never the reverse, so no owning cycle is structurally
/// possible. Child lists are indexed on insert for `children_of` /
/// `descendants_of`.
#[derive(Debug, Default)]
pub struct LineItemTree {
    items: Vec<LineItem>,
    by_id: HashMap<LineItemId, usize>,
    children_of_parent: HashMap<LineNumber, Vec<LineNumber>>,
}

impl LineItemTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter()
    }

    /// Validates that `parent` both exists and is not voided, and that
    /// attaching a child under it cannot create a cycle. Because lines are
    /// strictly append-only and a parent must already exist before any
    /// child referencing it is created, a cycle can never actually occur;
    /// the walk is kept anyway so the invariant is enforced rather than
    /// merely assumed.
    pub fn validate_parent(&self, parent: LineNumber) -> KernelResult<()> {
        let parent_item = self
            .find_by_number(parent)
            .ok_or_else(|| KernelError::NotFound(format!("line {parent} not found")))?;
        if parent_item.voided {
            return Err(KernelError::ValidationFailed(format!(
                "parent line {parent} is voided"
            )));
        }

        let mut visited = std::collections::HashSet::new();
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return Err(KernelError::ValidationFailed(format!(
                    "parent chain from line {parent} would create a cycle"
                )));
            }
            cursor = self.find_by_number(current).and_then(|l| l.parent_line_item_id);
        }
        Ok(())
    }

    /// Appends a new line item, assigning the next line number. Returns
    /// the assigned line number.
    pub fn insert(&mut self, mut item: LineItem) -> LineNumber {
        let line_number = (self.items.len() + 1) as LineNumber;
        item.line_number = line_number;
        self.by_id.insert(item.line_item_id.clone(), self.items.len());
        if let Some(parent) = item.parent_line_item_id {
            self.children_of_parent.entry(parent).or_default().push(line_number);
        }
        self.items.push(item);
        line_number
    }

    pub fn find_by_id(&self, id: &LineItemId) -> Option<&LineItem> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    fn index_of_number(&self, line_number: LineNumber) -> Option<usize> {
        if line_number == 0 {
            return None;
        }
        let idx = (line_number - 1) as usize;
        if idx < self.items.len() {
            Some(idx)
        } else {
            None
        }
    }

    /// Line numbers are monotonic and never compacted, so a line's index
    /// in the insertion-ordered vector is always `line_number - 1`.
    pub fn find_by_number(&self, line_number: LineNumber) -> Option<&LineItem> {
        self.index_of_number(line_number).map(|idx| &self.items[idx])
    }

    fn find_by_number_mut(&mut self, line_number: LineNumber) -> Option<&mut LineItem> {
        match self.index_of_number(line_number) {
            Some(idx) => Some(&mut self.items[idx]),
            None => None,
        }
    }

    /// Direct children of `parent`, in insertion order.
    pub fn children_of(&self, parent: LineNumber) -> &[LineNumber] {
        self.children_of_parent.get(&parent).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Transitive closure of `children_of`, in insertion order: every
    /// direct child followed immediately by its own descendants.
    pub fn descendants_of(&self, parent: LineNumber) -> Vec<LineNumber> {
        let mut out = Vec::new();
        for &child in self.children_of(parent) {
            out.push(child);
            out.extend(self.descendants_of(child));
        }
        out
    }

    /// Voids `target` and every descendant, deepest first, then the
    /// target itself last ("post-order"). Already-voided lines are
    /// skipped, so a second call is a no-op - idempotent by construction.
    pub fn void_cascade(&mut self, target: LineNumber, reason: &str) -> KernelResult<()> {
        if self.find_by_number(target).is_none() {
            return Err(KernelError::NotFound(format!("line {target} not found")));
        }

        let descendants = self.descendants_of(target);
        for &line_number in descendants.iter().rev() {
            if let Some(line) = self.find_by_number_mut(line_number) {
                if !line.voided {
                    line.voided = true;
                    line.void_reason = Some(format!("Parent voided: {reason}"));
                }
            }
        }

        if let Some(line) = self.find_by_number_mut(target) {
            if !line.voided {
                line.voided = true;
                line.void_reason = Some(reason.to_string());
            }
        }
        Ok(())
    }

    pub fn update_by_id(
        &mut self,
        id: &LineItemId,
        new_qty: Option<i32>,
        new_unit_price: Option<Money>,
    ) -> KernelResult<()> {
        let idx = *self
            .by_id
            .get(id)
            .ok_or_else(|| KernelError::NotFound(format!("line item {id} not found")))?;
        let item = &mut self.items[idx];
        if item.voided {
            return Err(KernelError::ValidationFailed(format!(
                "line item {id} is voided and cannot be modified"
            )));
        }
        if let Some(qty) = new_qty {
            if qty == 0 {
                return Err(KernelError::ValidationFailed("quantity must not be zero".into()));
            }
            item.quantity = qty;
        }
        if let Some(price) = new_unit_price {
            item.unit_price = price;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::CurrencyCode;

    fn price(minor: i64) -> Money {
        Money::new(minor, CurrencyCode::parse("USD").unwrap())
    }

    fn line(product_id: &str, qty: i32, unit_minor: i64, parent: Option<LineNumber>) -> LineItem {
        LineItem {
            line_item_id: LineItemId::new(crate::ids::TransactionId::from_parts(0, 1), 1),
            line_number: 0,
            product_id: product_id.to_string(),
            quantity: qty,
            unit_price: price(unit_minor),
            parent_line_item_id: parent,
            voided: false,
            void_reason: None,
            operator_id: None,
            created_at: 0,
        }
    }

    #[test]
    fn insert_assigns_monotonic_line_numbers() {
        let mut tree = LineItemTree::new();
        assert_eq!(tree.insert(line("A", 1, 100, None)), 1);
        assert_eq!(tree.insert(line("B", 1, 200, None)), 2);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn descendants_are_transitive_closure_in_insertion_order() {
        let mut tree = LineItemTree::new();
        tree.insert(line("SET", 1, 740, None)); // 1
        tree.insert(line("DRINK", 1, 0, Some(1))); // 2
        tree.insert(line("MOD", 1, 0, Some(2))); // 3
        assert_eq!(tree.children_of(1), &[2]);
        assert_eq!(tree.descendants_of(1), vec![2, 3]);
    }

    #[test]
    fn void_cascade_orders_deepest_first_and_is_idempotent() {
        let mut tree = LineItemTree::new();
        tree.insert(line("SET", 1, 740, None));
        tree.insert(line("DRINK", 1, 0, Some(1)));
        tree.insert(line("MOD", 1, 0, Some(2)));

        tree.void_cascade(1, "customer changed mind").unwrap();
        assert!(tree.find_by_number(1).unwrap().voided);
        assert!(tree.find_by_number(2).unwrap().voided);
        assert!(tree.find_by_number(3).unwrap().voided);
        assert_eq!(
            tree.find_by_number(1).unwrap().void_reason.as_deref(),
            Some("customer changed mind")
        );
        assert_eq!(
            tree.find_by_number(2).unwrap().void_reason.as_deref(),
            Some("Parent voided: customer changed mind")
        );

        // second invocation changes nothing
        let before = tree.find_by_number(1).unwrap().void_reason.clone();
        tree.void_cascade(1, "different reason").unwrap();
        assert_eq!(tree.find_by_number(1).unwrap().void_reason, before);
    }

    #[test]
    fn void_cascade_unknown_line_is_not_found() {
        let mut tree = LineItemTree::new();
        assert!(matches!(tree.void_cascade(1, "x"), Err(KernelError::NotFound(_))));
    }

    #[test]
    fn validate_parent_rejects_voided_parent() {
        let mut tree = LineItemTree::new();
        tree.insert(line("SET", 1, 740, None));
        tree.void_cascade(1, "gone").unwrap();
        assert!(matches!(
            tree.validate_parent(1),
            Err(KernelError::ValidationFailed(_))
        ));
    }
}
