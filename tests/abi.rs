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

//! End-to-end tests driving the kernel through its real `extern "C"`
//! surface, the way a host binding would. The handle registry is
//! process-wide global state, so every test here runs `#[serial]` to
//! avoid one test's handles or terminal binding bleeding into another.

use std::thread;

use pos_kernel::abi;
use pos_kernel::error::ResultCode;
use serial_test::serial;

unsafe fn begin(store: &str, currency: &str) -> u64 {
    let mut handle = 0u64;
    let result = abi::pk_begin_transaction(
        store.as_ptr(),
        store.len(),
        currency.as_ptr(),
        currency.len(),
        &mut handle,
    );
    assert!(abi::pk_result_is_ok(result));
    handle
}

unsafe fn add_line(handle: u64, sku: &str, qty: i32, unit_minor: i64) {
    let result = abi::pk_add_line(handle, sku.as_ptr(), sku.len(), qty, unit_minor);
    assert!(abi::pk_result_is_ok(result), "add_line({sku}) failed: {}", abi::pk_result_get_code(result));
}

unsafe fn add_child_line(handle: u64, sku: &str, qty: i32, unit_minor: i64, parent: u32) {
    let result = abi::pk_add_child_line(handle, sku.as_ptr(), sku.len(), qty, unit_minor, parent);
    assert!(abi::pk_result_is_ok(result), "add_child_line({sku}) failed: {}", abi::pk_result_get_code(result));
}

unsafe fn totals(handle: u64) -> (i64, i64, i64, i32) {
    let (mut total, mut tendered, mut change, mut state) = (0i64, 0i64, 0i64, 0i32);
    let result = abi::pk_get_totals(handle, &mut total, &mut tendered, &mut change, &mut state);
    assert!(abi::pk_result_is_ok(result));
    (total, tendered, change, state)
}

/// Reads a line item's sku and stable id via the two-call protocol,
/// returning `(sku, line_item_id, quantity, unit_minor, has_parent, voided)`.
unsafe fn read_line(handle: u64, line_number: u32) -> (String, String, i32, i64, bool, bool) {
    let (mut qty, mut unit_minor, mut parent_ln, mut has_parent, mut voided) =
        (0i32, 0i64, 0u32, false, false);
    let mut sku_required = 0usize;
    let mut id_required = 0usize;
    let probe = abi::pk_get_line_item(
        handle,
        line_number,
        std::ptr::null_mut(),
        0,
        &mut sku_required,
        &mut qty,
        &mut unit_minor,
        &mut parent_ln,
        &mut has_parent,
        &mut voided,
        std::ptr::null_mut(),
        0,
        &mut id_required,
    );
    assert!(
        abi::pk_result_is_ok(probe) || abi::pk_result_get_code(probe) == ResultCode::InsufficientBuffer as i32
    );

    let mut sku_buf = vec![0u8; sku_required];
    let mut id_buf = vec![0u8; id_required];
    let result = abi::pk_get_line_item(
        handle,
        line_number,
        sku_buf.as_mut_ptr(),
        sku_buf.len(),
        &mut sku_required,
        &mut qty,
        &mut unit_minor,
        &mut parent_ln,
        &mut has_parent,
        &mut voided,
        id_buf.as_mut_ptr(),
        id_buf.len(),
        &mut id_required,
    );
    assert!(abi::pk_result_is_ok(result));
    (String::from_utf8(sku_buf).unwrap(), String::from_utf8(id_buf).unwrap(), qty, unit_minor, has_parent, voided)
}

unsafe fn read_two_call(f: impl Fn(*mut u8, usize, *mut usize) -> pos_kernel::PkResult) -> String {
    let mut required = 0usize;
    let probe = f(std::ptr::null_mut(), 0, &mut required);
    if required == 0 {
        assert!(abi::pk_result_is_ok(probe));
        return String::new();
    }
    assert_eq!(abi::pk_result_get_code(probe), ResultCode::InsufficientBuffer as i32);
    let mut buf = vec![0u8; required];
    let mut actual = 0usize;
    let result = f(buf.as_mut_ptr(), buf.len(), &mut actual);
    assert!(abi::pk_result_is_ok(result));
    assert_eq!(actual, required);
    String::from_utf8(buf).unwrap()
}

#[test]
#[serial]
fn scenario_usd_exact_cash_tender() {
    unsafe {
        let handle = begin("Store-1001", "USD");
        add_line(handle, "SKU-1001", 1, 199);
        add_line(handle, "SKU-2002", 2, 99);
        let (total, tendered, change, state) = totals(handle);
        assert_eq!((total, tendered, change), (397, 0, 0));
        assert_eq!(state, 0); // Building

        assert!(abi::pk_result_is_ok(abi::pk_add_cash_tender(handle, 397)));
        let (total, tendered, change, state) = totals(handle);
        assert_eq!((total, tendered, change), (397, 397, 0));
        assert_eq!(state, 1); // Completed

        assert!(abi::pk_result_is_ok(abi::pk_close_transaction(handle)));
    }
}

#[test]
#[serial]
fn scenario_jpy_zero_decimal_currency() {
    unsafe {
        let handle = begin("Store-JP", "JPY");
        add_line(handle, "BENTO", 1, 850);

        let mut places = 0u8;
        assert!(abi::pk_result_is_ok(abi::pk_get_currency_decimal_places(handle, &mut places)));
        assert_eq!(places, 0);

        assert!(abi::pk_result_is_ok(abi::pk_add_cash_tender(handle, 1000)));
        let (total, tendered, change, state) = totals(handle);
        assert_eq!((total, tendered, change), (850, 1000, 150));
        assert_eq!(state, 1);
    }
}

#[test]
#[serial]
fn scenario_nrf_hierarchy_and_cascading_void_by_id() {
    unsafe {
        let handle = begin("Kopi-01", "SGD");
        add_line(handle, "TSET001", 1, 740);
        add_child_line(handle, "TEH002", 1, 0, 1);
        add_child_line(handle, "MOD_NO_SUGAR", 1, 0, 2);

        let mut count = 0u32;
        assert!(abi::pk_result_is_ok(abi::pk_get_line_count(handle, &mut count)));
        assert_eq!(count, 3);

        let (_, line_1_id, _, _, has_parent, voided) = read_line(handle, 1);
        assert!(!has_parent);
        assert!(!voided);

        let reason = "customer changed mind";
        let void_result = abi::pk_void_line_item_by_id(
            handle,
            line_1_id.as_ptr(),
            line_1_id.len(),
            reason.as_ptr(),
            reason.len(),
        );
        assert!(abi::pk_result_is_ok(void_result));

        for line_number in 1..=3u32 {
            let (_, _, _, _, _, voided) = read_line(handle, line_number);
            assert!(voided, "line {line_number} should be voided by cascade");
        }

        // idempotent: voiding again must not error or change anything
        let void_again = abi::pk_void_line_item_by_id(
            handle,
            line_1_id.as_ptr(),
            line_1_id.len(),
            "different reason".as_ptr(),
            "different reason".len(),
        );
        assert!(abi::pk_result_is_ok(void_again));

        let (total, _, _, _) = totals(handle);
        assert_eq!(total, 0);
    }
}

#[test]
#[serial]
fn begin_transaction_rejects_malformed_currency_code() {
    unsafe {
        let mut handle = 0u64;
        let bad_currency = "US";
        let result = abi::pk_begin_transaction(
            "Store-X".as_ptr(),
            "Store-X".len(),
            bad_currency.as_ptr(),
            bad_currency.len(),
            &mut handle,
        );
        assert_eq!(abi::pk_result_get_code(result), ResultCode::ValidationFailed as i32);
    }
}

#[test]
#[serial]
fn empty_sku_is_rejected() {
    unsafe {
        let handle = begin("Store-1001", "USD");
        let result = abi::pk_add_line(handle, std::ptr::null(), 0, 1, 100);
        assert_eq!(abi::pk_result_get_code(result), ResultCode::ValidationFailed as i32);

        let mut count = 0u32;
        assert!(abi::pk_result_is_ok(abi::pk_get_line_count(handle, &mut count)));
        assert_eq!(count, 0, "rejected line must not be appended");
    }
}

#[test]
#[serial]
fn modify_by_id_applies_only_supplied_fields() {
    unsafe {
        let handle = begin("Store-1001", "USD");
        add_line(handle, "SKU-1001", 2, 100);

        let (_, id, _, _, _, _) = read_line(handle, 1);

        // only change quantity, leave unit price untouched
        let result = abi::pk_modify_line_item_by_id(handle, id.as_ptr(), id.len(), true, 5, false, 0);
        assert!(abi::pk_result_is_ok(result));

        let (total, _, _, _) = totals(handle);
        assert_eq!(total, 500); // 5 * 100, unit price unchanged
    }
}

#[test]
#[serial]
fn void_transaction_rejects_further_line_additions() {
    unsafe {
        let handle = begin("Store-1001", "USD");
        add_line(handle, "SKU-1001", 1, 100);
        assert!(abi::pk_result_is_ok(abi::pk_void_transaction(handle)));

        let result = abi::pk_add_line(handle, "SKU-2002".as_ptr(), "SKU-2002".len(), 1, 50);
        assert_eq!(abi::pk_result_get_code(result), ResultCode::InvalidState as i32);

        // voiding an already-voided transaction is also InvalidState
        let result = abi::pk_void_transaction(handle);
        assert_eq!(abi::pk_result_get_code(result), ResultCode::InvalidState as i32);
    }
}

#[test]
#[serial]
fn two_call_string_protocol_never_truncates() {
    unsafe {
        let handle = begin("A Rather Long Store Name That Exceeds A Small Buffer", "USD");
        let name = read_two_call(|buf, size, required| abi::pk_get_store_name(handle, buf, size, required));
        assert_eq!(name, "A Rather Long Store Name That Exceeds A Small Buffer");

        let currency = read_two_call(|buf, size, required| abi::pk_get_currency(handle, buf, size, required));
        assert_eq!(currency, "USD");
    }
}

#[test]
#[serial]
fn version_string_is_nonempty_and_stable_across_calls() {
    unsafe {
        let mut len1 = 0usize;
        let p1 = abi::pk_get_version(&mut len1);
        let v1 = std::slice::from_raw_parts(p1, len1).to_vec();
        assert!(!v1.is_empty());
        assert!(std::str::from_utf8(&v1).is_ok());

        let mut len2 = 0usize;
        let p2 = abi::pk_get_version(&mut len2);
        let v2 = std::slice::from_raw_parts(p2, len2).to_vec();
        assert_eq!(v1, v2);
        assert_eq!(p1, p2, "version pointer has process lifetime and must not move");
    }
}

#[test]
#[serial]
fn concurrent_transactions_on_distinct_handles_do_not_interfere() {
    // P5: operations against different handles are linearizable with
    // respect to each other; concurrent writers on separate handles must
    // not corrupt one another's line counts.
    let handles: Vec<u64> = (0..8)
        .map(|i| unsafe { begin(&format!("Store-{i}"), "USD") })
        .collect();

    let join_handles: Vec<_> = handles
        .iter()
        .copied()
        .map(|handle| {
            thread::spawn(move || unsafe {
                for i in 0..50 {
                    let sku = format!("SKU-{i}");
                    add_line(handle, &sku, 1, 100);
                }
            })
        })
        .collect();

    for jh in join_handles {
        jh.join().unwrap();
    }

    for handle in handles {
        let mut count = 0u32;
        unsafe {
            assert!(abi::pk_result_is_ok(abi::pk_get_line_count(handle, &mut count)));
        }
        assert_eq!(count, 50);
    }
}

#[test]
#[serial]
fn unknown_handle_is_not_found() {
    unsafe {
        let (mut total, mut tendered, mut change, mut state) = (0i64, 0i64, 0i64, 0i32);
        let result = abi::pk_get_totals(999_999, &mut total, &mut tendered, &mut change, &mut state);
        assert_eq!(abi::pk_result_get_code(result), ResultCode::NotFound as i32);
    }
}

#[test]
#[serial]
fn invalid_handle_zero_is_rejected() {
    unsafe {
        let mut count = 0u32;
        let result = abi::pk_get_line_count(0, &mut count);
        assert_eq!(abi::pk_result_get_code(result), ResultCode::NotFound as i32);
    }
}

#[test]
#[serial]
fn standard_currency_and_validation_utilities() {
    unsafe {
        assert!(abi::pk_is_standard_currency("USD".as_ptr(), 3));
        assert!(!abi::pk_is_standard_currency("SGD".as_ptr(), 3));
        assert!(abi::pk_result_is_ok(abi::pk_validate_currency_code("USD".as_ptr(), 3)));
        assert_eq!(
            abi::pk_result_get_code(abi::pk_validate_currency_code("US".as_ptr(), 2)),
            ResultCode::ValidationFailed as i32
        );
    }
}

#[test]
#[serial]
fn terminal_lifecycle_and_double_init_collision() {
    unsafe {
        assert!(abi::pk_result_is_ok(abi::pk_initialize_terminal("T01".as_ptr(), 3)));
        // re-initializing with the same id is idempotent, not a collision
        assert!(abi::pk_result_is_ok(abi::pk_initialize_terminal("T01".as_ptr(), 3)));

        let collision = abi::pk_initialize_terminal("T02".as_ptr(), 3);
        assert_eq!(abi::pk_result_get_code(collision), ResultCode::InvalidState as i32);

        let mut required = 0usize;
        let probe = abi::pk_get_terminal_info(std::ptr::null_mut(), 0, &mut required);
        assert_eq!(abi::pk_result_get_code(probe), ResultCode::InsufficientBuffer as i32);
        let mut buf = vec![0u8; required];
        let mut actual = 0usize;
        assert!(abi::pk_result_is_ok(abi::pk_get_terminal_info(buf.as_mut_ptr(), buf.len(), &mut actual)));
        assert_eq!(String::from_utf8(buf).unwrap(), "T01");

        assert!(abi::pk_result_is_ok(abi::pk_shutdown_terminal()));
    }
}
