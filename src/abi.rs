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

//! The stable C ABI surface. Every exported function is `extern "C"`,
//! `#[no_mangle]`, and does nothing but: validate raw inputs, resolve a
//! handle through the registry, call exactly one aggregate operation, and
//! translate the result back into a `PkResult`. No business rule lives
//! here - see `transaction.rs`, `line_item.rs`, `money.rs`.
//!
//! Every function is wrapped in `catch_unwind` so a panic anywhere below
//! this layer turns into `InternalError` instead of unwinding across the
//! FFI boundary, which is undefined behavior.

use std::panic::{self, AssertUnwindSafe};

use crate::error::{KernelError, KernelResult, PkResult, ResultCode};
use crate::ids::LineItemId;
use crate::money::{self, CurrencyCode, Money};
use crate::registry::{self, Handle};
use crate::transaction::LineItemPatch;
use crate::version;

fn guard<F>(f: F) -> PkResult
where
    F: FnOnce() -> PkResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("panic caught at the ABI boundary");
            PkResult::err(ResultCode::InternalError)
        }
    }
}

fn from_kernel_result<T>(r: KernelResult<T>, apply: impl FnOnce(T)) -> PkResult {
    match r {
        Ok(value) => {
            apply(value);
            PkResult::ok()
        }
        Err(e) => PkResult::from(e),
    }
}

/// Reads a caller-owned `(ptr, len)` UTF-8 string. A null pointer paired
/// with a non-zero length is a validation failure; invalid UTF-8 is
/// replaced lossily rather than treated as fatal.
unsafe fn read_required_str(ptr: *const u8, len: usize) -> KernelResult<String> {
    if ptr.is_null() {
        if len != 0 {
            return Err(KernelError::ValidationFailed(
                "null pointer with non-zero length".into(),
            ));
        }
        return Ok(String::new());
    }
    let slice = std::slice::from_raw_parts(ptr, len);
    Ok(String::from_utf8_lossy(slice).into_owned())
}

/// Win32-style two-call string write: first call with a null/zero buffer
/// to learn `required_size`, second call with an adequately sized buffer.
/// Never partially writes and never touches `buf` when it is too small.
unsafe fn write_out_string(value: &str, buf: *mut u8, buf_size: usize, out_required: *mut usize) -> PkResult {
    if out_required.is_null() {
        return PkResult::err(ResultCode::ValidationFailed);
    }
    let bytes = value.as_bytes();
    *out_required = bytes.len();
    if bytes.len() > buf_size {
        return PkResult::err(ResultCode::InsufficientBuffer);
    }
    if !bytes.is_empty() {
        if buf.is_null() {
            return PkResult::err(ResultCode::ValidationFailed);
        }
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
    }
    PkResult::ok()
}

fn parse_currency(code: &str) -> KernelResult<CurrencyCode> {
    CurrencyCode::parse(code)
}

fn parse_line_item_id_bytes(bytes: &str) -> LineItemId {
    // The wire format has no structure the ABI layer needs to validate;
    // unknown ids are simply rejected downstream with NotFound.
    LineItemId::from_wire(bytes)
}

// === Result helpers ===

#[no_mangle]
pub extern "C" fn pk_result_is_ok(result: PkResult) -> bool {
    result.code == ResultCode::Ok as i32
}

#[no_mangle]
pub extern "C" fn pk_result_get_code(result: PkResult) -> i32 {
    result.code
}

// === Lifecycle ===

/// Returns a pointer to the UTF-8 version string (no trailing NUL) with
/// process lifetime, and fills `out_len` with its byte length. This is
/// the one ABI function allowed to hand back a pointer the caller must
/// not free - it points into static memory.
#[no_mangle]
pub unsafe extern "C" fn pk_get_version(out_len: *mut usize) -> *const u8 {
    let bytes = version::version_bytes();
    if !out_len.is_null() {
        *out_len = bytes.len();
    }
    bytes.as_ptr()
}

/// # Safety
/// `terminal_id_ptr` must point to `terminal_id_len` valid UTF-8 bytes (or
/// be null with `terminal_id_len == 0`) for the duration of this call.
#[no_mangle]
pub unsafe extern "C" fn pk_initialize_terminal(
    terminal_id_ptr: *const u8,
    terminal_id_len: usize,
) -> PkResult {
    guard(|| {
        let terminal_id = match read_required_str(terminal_id_ptr, terminal_id_len) {
            Ok(s) => s,
            Err(e) => return PkResult::from(e),
        };
        if terminal_id.is_empty() {
            return PkResult::err(ResultCode::ValidationFailed);
        }
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        from_kernel_result(reg.initialize_terminal(terminal_id), |_| {})
    })
}

#[no_mangle]
pub extern "C" fn pk_shutdown_terminal() -> PkResult {
    guard(|| {
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        reg.shutdown_terminal();
        PkResult::ok()
    })
}

/// # Safety
/// `buf` must be valid for `buf_size` writable bytes (or null when
/// `buf_size == 0`); `out_required` must point to valid memory.
#[no_mangle]
pub unsafe extern "C" fn pk_get_terminal_info(
    buf: *mut u8,
    buf_size: usize,
    out_required: *mut usize,
) -> PkResult {
    guard(|| {
        let reg = match registry::registry().read() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        match reg.terminal_id() {
            Some(id) => write_out_string(id, buf, buf_size, out_required),
            None => PkResult::err(ResultCode::NotFound),
        }
    })
}

// === Transaction lifecycle ===

/// # Safety
/// `store_ptr`/`currency_ptr` must point to their respective `_len` valid
/// UTF-8 bytes (or be null with length 0); `out_handle` must point to
/// valid, writable memory for the duration of this call.
#[no_mangle]
pub unsafe extern "C" fn pk_begin_transaction(
    store_ptr: *const u8,
    store_len: usize,
    currency_ptr: *const u8,
    currency_len: usize,
    out_handle: *mut Handle,
) -> PkResult {
    guard(|| {
        if out_handle.is_null() {
            return PkResult::err(ResultCode::ValidationFailed);
        }
        let store = match read_required_str(store_ptr, store_len) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => return PkResult::err(ResultCode::ValidationFailed),
            Err(e) => return PkResult::from(e),
        };
        let currency_code = match read_required_str(currency_ptr, currency_len) {
            Ok(s) => s,
            Err(e) => return PkResult::from(e),
        };
        let currency = match parse_currency(&currency_code) {
            Ok(c) => c,
            Err(e) => return PkResult::from(e),
        };
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let handle = reg.begin_transaction(store, currency);
        *out_handle = handle;
        PkResult::ok()
    })
}

#[no_mangle]
pub extern "C" fn pk_close_transaction(handle: Handle) -> PkResult {
    guard(|| {
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        from_kernel_result(reg.close(handle), |_| {})
    })
}

// === Line items ===

/// # Safety
/// `sku_ptr` must point to `sku_len` valid UTF-8 bytes (or be null with
/// `sku_len == 0`) for the duration of this call.
#[no_mangle]
pub unsafe extern "C" fn pk_add_line(
    handle: Handle,
    sku_ptr: *const u8,
    sku_len: usize,
    qty: i32,
    unit_minor: i64,
) -> PkResult {
    guard(|| {
        let sku = match read_required_str(sku_ptr, sku_len) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => return PkResult::err(ResultCode::ValidationFailed),
            Err(e) => return PkResult::from(e),
        };
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get_mut(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        let price = Money::new(unit_minor, tx.currency);
        from_kernel_result(tx.add_line_item(sku, qty, price), |_| {})
    })
}

/// # Safety
/// See [`pk_add_line`].
#[no_mangle]
pub unsafe extern "C" fn pk_add_child_line(
    handle: Handle,
    sku_ptr: *const u8,
    sku_len: usize,
    qty: i32,
    unit_minor: i64,
    parent_line_number: u32,
) -> PkResult {
    guard(|| {
        let sku = match read_required_str(sku_ptr, sku_len) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => return PkResult::err(ResultCode::ValidationFailed),
            Err(e) => return PkResult::from(e),
        };
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get_mut(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        let price = Money::new(unit_minor, tx.currency);
        from_kernel_result(
            tx.add_child_line_item(sku, qty, price, parent_line_number),
            |_| {},
        )
    })
}

/// # Safety
/// `parent_id_ptr`/`mod_sku_ptr` must point to their `_len` valid UTF-8
/// bytes (or be null with length 0).
#[no_mangle]
pub unsafe extern "C" fn pk_add_modification_by_line_item_id(
    handle: Handle,
    parent_id_ptr: *const u8,
    parent_id_len: usize,
    mod_sku_ptr: *const u8,
    mod_sku_len: usize,
    qty: i32,
    unit_minor: i64,
) -> PkResult {
    guard(|| {
        let parent_id = match read_required_str(parent_id_ptr, parent_id_len) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => return PkResult::err(ResultCode::ValidationFailed),
            Err(e) => return PkResult::from(e),
        };
        let mod_sku = match read_required_str(mod_sku_ptr, mod_sku_len) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => return PkResult::err(ResultCode::ValidationFailed),
            Err(e) => return PkResult::from(e),
        };
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get_mut(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        let price = Money::new(unit_minor, tx.currency);
        let parent = parse_line_item_id_bytes(&parent_id);
        from_kernel_result(
            tx.add_modification_by_line_item_id(&parent, mod_sku, qty, price),
            |_| {},
        )
    })
}

/// # Safety
/// `id_ptr`/`reason_ptr` must point to their `_len` valid UTF-8 bytes (or
/// be null with length 0).
#[no_mangle]
pub unsafe extern "C" fn pk_void_line_item_by_id(
    handle: Handle,
    id_ptr: *const u8,
    id_len: usize,
    reason_ptr: *const u8,
    reason_len: usize,
) -> PkResult {
    guard(|| {
        let id_str = match read_required_str(id_ptr, id_len) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => return PkResult::err(ResultCode::ValidationFailed),
            Err(e) => return PkResult::from(e),
        };
        let reason = match read_required_str(reason_ptr, reason_len) {
            Ok(s) => s,
            Err(e) => return PkResult::from(e),
        };
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get_mut(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        let id = parse_line_item_id_bytes(&id_str);
        from_kernel_result(tx.void_line_item_by_id(&id, &reason, None), |_| {})
    })
}

#[no_mangle]
pub extern "C" fn pk_void_transaction(handle: Handle) -> PkResult {
    guard(|| {
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get_mut(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        from_kernel_result(tx.void_transaction(), |_| {})
    })
}

/// Modifies a line item by its stable id. `has_new_qty`/`has_new_unit_price`
/// select which of `new_qty`/`new_unit_minor` are applied - this "by stable
/// id" operation takes each field as independently optional, which a bare
/// C ABI has to spell out with explicit presence flags.
///
/// # Safety
/// `id_ptr` must point to `id_len` valid UTF-8 bytes (or be null with
/// `id_len == 0`).
#[no_mangle]
pub unsafe extern "C" fn pk_modify_line_item_by_id(
    handle: Handle,
    id_ptr: *const u8,
    id_len: usize,
    has_new_qty: bool,
    new_qty: i32,
    has_new_unit_price: bool,
    new_unit_minor: i64,
) -> PkResult {
    guard(|| {
        let id_str = match read_required_str(id_ptr, id_len) {
            Ok(s) if !s.is_empty() => s,
            Ok(_) => return PkResult::err(ResultCode::ValidationFailed),
            Err(e) => return PkResult::from(e),
        };
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get_mut(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        let id = parse_line_item_id_bytes(&id_str);
        let patch = LineItemPatch {
            new_quantity: has_new_qty.then_some(new_qty),
            new_unit_price: has_new_unit_price.then_some(Money::new(new_unit_minor, tx.currency)),
        };
        from_kernel_result(tx.modify_line_item_by_id(&id, patch), |_| {})
    })
}

// === Tenders ===

#[no_mangle]
pub extern "C" fn pk_add_cash_tender(handle: Handle, amount_minor: i64) -> PkResult {
    guard(|| {
        let mut reg = match registry::registry().write() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get_mut(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        let amount = Money::new(amount_minor, tx.currency);
        from_kernel_result(tx.add_cash_tender(amount), |_| {})
    })
}

// === Queries ===

/// # Safety
/// All four output pointers must be valid and writable for the duration
/// of this call.
#[no_mangle]
pub unsafe extern "C" fn pk_get_totals(
    handle: Handle,
    out_total_minor: *mut i64,
    out_tendered_minor: *mut i64,
    out_change_minor: *mut i64,
    out_state: *mut i32,
) -> PkResult {
    guard(|| {
        if out_total_minor.is_null()
            || out_tendered_minor.is_null()
            || out_change_minor.is_null()
            || out_state.is_null()
        {
            return PkResult::err(ResultCode::ValidationFailed);
        }
        let reg = match registry::registry().read() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        from_kernel_result(tx.get_totals(), |(total, tendered, change, state)| {
            *out_total_minor = total.minor_units;
            *out_tendered_minor = tendered.minor_units;
            *out_change_minor = change.minor_units;
            *out_state = state as i32;
        })
    })
}

/// # Safety
/// `out_count` must be valid and writable.
#[no_mangle]
pub unsafe extern "C" fn pk_get_line_count(handle: Handle, out_count: *mut u32) -> PkResult {
    guard(|| {
        if out_count.is_null() {
            return PkResult::err(ResultCode::ValidationFailed);
        }
        let reg = match registry::registry().read() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        *out_count = tx.line_count();
        PkResult::ok()
    })
}

/// # Safety
/// `buf` must be valid for `buf_size` writable bytes (or null when
/// `buf_size == 0`); `out_required` must point to valid memory.
#[no_mangle]
pub unsafe extern "C" fn pk_get_store_name(
    handle: Handle,
    buf: *mut u8,
    buf_size: usize,
    out_required: *mut usize,
) -> PkResult {
    guard(|| {
        let reg = match registry::registry().read() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        write_out_string(&tx.store_name, buf, buf_size, out_required)
    })
}

/// # Safety
/// See [`pk_get_store_name`].
#[no_mangle]
pub unsafe extern "C" fn pk_get_currency(
    handle: Handle,
    buf: *mut u8,
    buf_size: usize,
    out_required: *mut usize,
) -> PkResult {
    guard(|| {
        let reg = match registry::registry().read() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        write_out_string(tx.currency.as_str(), buf, buf_size, out_required)
    })
}

/// # Safety
/// `out_decimal_places` must be valid and writable.
#[no_mangle]
pub unsafe extern "C" fn pk_get_currency_decimal_places(
    handle: Handle,
    out_decimal_places: *mut u8,
) -> PkResult {
    guard(|| {
        if out_decimal_places.is_null() {
            return PkResult::err(ResultCode::ValidationFailed);
        }
        let reg = match registry::registry().read() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        *out_decimal_places = money::decimal_places_for(tx.currency.as_str());
        PkResult::ok()
    })
}

/// Reads a single line item's flat fields. `sku`/`line_item_id` use the
/// two-call string protocol; everything else is a fixed-size out-param.
///
/// # Safety
/// `sku_buf`/`line_item_id_buf` must each be valid for their respective
/// `_buf_size` writable bytes (or null when size is 0); all other output
/// pointers must be valid and writable.
#[no_mangle]
pub unsafe extern "C" fn pk_get_line_item(
    handle: Handle,
    line_number: u32,
    sku_buf: *mut u8,
    sku_buf_size: usize,
    out_sku_required: *mut usize,
    out_qty: *mut i32,
    out_unit_minor: *mut i64,
    out_parent_line_number: *mut u32,
    out_has_parent: *mut bool,
    out_voided: *mut bool,
    line_item_id_buf: *mut u8,
    line_item_id_buf_size: usize,
    out_line_item_id_required: *mut usize,
) -> PkResult {
    guard(|| {
        if out_qty.is_null()
            || out_unit_minor.is_null()
            || out_parent_line_number.is_null()
            || out_has_parent.is_null()
            || out_voided.is_null()
        {
            return PkResult::err(ResultCode::ValidationFailed);
        }
        let reg = match registry::registry().read() {
            Ok(g) => g,
            Err(_) => return PkResult::err(ResultCode::InternalError),
        };
        let tx = match reg.get(handle) {
            Ok(tx) => tx,
            Err(e) => return PkResult::from(e),
        };
        let line = match tx.line_item(line_number) {
            Ok(l) => l,
            Err(e) => return PkResult::from(e),
        };

        // Both required sizes are reported in the same call even when one
        // or both buffers are too small, so a caller probing with null
        // buffers learns both sizes in a single round trip.
        let sku_result = write_out_string(&line.product_id, sku_buf, sku_buf_size, out_sku_required);
        let id_result = write_out_string(
            line.line_item_id.as_str(),
            line_item_id_buf,
            line_item_id_buf_size,
            out_line_item_id_required,
        );
        if pk_result_get_code(sku_result) != ResultCode::Ok as i32 {
            return sku_result;
        }
        if pk_result_get_code(id_result) != ResultCode::Ok as i32 {
            return id_result;
        }

        *out_qty = line.quantity;
        *out_unit_minor = line.unit_price.minor_units;
        *out_voided = line.voided;
        match line.parent_line_item_id {
            Some(parent) => {
                *out_parent_line_number = parent;
                *out_has_parent = true;
            }
            None => {
                *out_parent_line_number = 0;
                *out_has_parent = false;
            }
        }
        PkResult::ok()
    })
}

// === Currency utilities (no handle required) ===

/// # Safety
/// `ptr` must point to `len` valid UTF-8 bytes (or be null with `len == 0`).
#[no_mangle]
pub unsafe extern "C" fn pk_validate_currency_code(ptr: *const u8, len: usize) -> PkResult {
    guard(|| {
        let code = match read_required_str(ptr, len) {
            Ok(s) => s,
            Err(e) => return PkResult::from(e),
        };
        if money::is_valid_currency(&code) {
            PkResult::ok()
        } else {
            PkResult::err(ResultCode::ValidationFailed)
        }
    })
}

/// # Safety
/// See [`pk_validate_currency_code`].
#[no_mangle]
pub unsafe extern "C" fn pk_is_standard_currency(ptr: *const u8, len: usize) -> bool {
    if ptr.is_null() || len == 0 {
        return false;
    }
    let slice = std::slice::from_raw_parts(ptr, len);
    let code = String::from_utf8_lossy(slice);
    money::is_standard_currency(&code)
}
