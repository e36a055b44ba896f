// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! The shop holds one state mutex while it talks to storage, and
//! `MemoryStorage` takes its own locks underneath. These tests drive many
//! threads through every operation to make sure that nesting never forms a
//! cycle, and that serialized checkouts never overdraw a balance.

use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shop_ledger_rs::{Ledger, MemoryStorage, NewProduct, ProductId, Shop, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

fn new_shop() -> Arc<Shop> {
    Arc::new(Shop::open(Arc::new(MemoryStorage::new())).unwrap())
}

fn add_product(shop: &Shop, price: Decimal) -> ProductId {
    shop.add_product(NewProduct {
        name: "Item".to_string(),
        price,
        image_url: "/uploads/item.png".to_string(),
    })
    .unwrap()
    .id
}

fn spent(shop: &Shop, user: UserId) -> Decimal {
    shop.transactions_for(user)
        .iter()
        .map(|t| t.total_price)
        .sum()
}

// === Tests ===

/// Many threads racing checkouts for the same user never overdraw.
#[test]
fn no_deadlock_concurrent_checkouts_same_user() {
    let detector = start_deadlock_detector();
    let shop = new_shop();
    let user = shop.create_user().unwrap().id;
    let product = add_product(&shop, dec!(7000));
    let completed = Arc::new(AtomicUsize::new(0));

    const NUM_THREADS: usize = 32;
    const OPS_PER_THREAD: usize = 20;

    let mut handles = Vec::with_capacity(NUM_THREADS);

    for _ in 0..NUM_THREADS {
        let shop = shop.clone();
        let completed = completed.clone();

        let handle = thread::spawn(move || {
            for _ in 0..OPS_PER_THREAD {
                shop.add_to_cart(user, product, 1).unwrap();
                if shop.checkout(user).is_ok() {
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let balance = shop.get_user(user).unwrap().balance;
    assert!(balance >= Decimal::ZERO);
    assert_eq!(balance + spent(&shop, user), Ledger::STARTING_BALANCE);
    assert_eq!(
        shop.transactions_for(user).len(),
        completed.load(Ordering::SeqCst)
    );
}

/// Mixed catalog, cart, checkout and read traffic across many users.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();
    let shop = new_shop();

    const NUM_USERS: usize = 16;
    let users: Vec<UserId> = (0..NUM_USERS)
        .map(|_| shop.create_user().unwrap().id)
        .collect();
    let products: Vec<ProductId> = (1..=8)
        .map(|i| add_product(&shop, Decimal::from(i * 25)))
        .collect();
    let users = Arc::new(users);
    let products = Arc::new(products);

    let mut handles = Vec::new();

    for t in 0..NUM_USERS {
        let shop = shop.clone();
        let users = users.clone();
        let products = products.clone();

        let handle = thread::spawn(move || {
            let user = users[t];
            for i in 0..100 {
                let product = products[(t + i) % products.len()];
                match i % 5 {
                    0 | 1 => {
                        let _ = shop.add_to_cart(user, product, (i % 3 + 1) as i64);
                    }
                    2 => {
                        let _ = shop.checkout(user);
                    }
                    3 => {
                        let _ = shop.cart_details(user);
                        let _ = shop.list_products();
                        let _ = shop.transactions_for(users[(t + 1) % users.len()]);
                    }
                    _ => {
                        let _ = shop.get_user(user);
                        let _ = shop.get_cart(user);
                    }
                }
            }
        });

        handles.push(handle);
    }

    // Catalog churn alongside the shoppers
    {
        let shop = shop.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let id = add_product(&shop, dec!(1));
                let _ = shop.delete_product(id);
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    for &user in users.iter() {
        let balance = shop.get_user(user).unwrap().balance;
        assert!(balance >= Decimal::ZERO);
        assert_eq!(balance + spent(&shop, user), Ledger::STARTING_BALANCE);
    }
}

/// Storage faults injected mid-traffic release the lock and leave state consistent.
#[test]
fn no_deadlock_with_storage_faults() {
    let detector = start_deadlock_detector();
    let storage = Arc::new(MemoryStorage::new());
    let shop = Arc::new(Shop::open(storage.clone()).unwrap());
    let user = shop.create_user().unwrap().id;
    let product = add_product(&shop, dec!(10));
    let stop = Arc::new(AtomicBool::new(false));

    let faults = {
        let storage = storage.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let documents = ["users.json", "transactions.json", "cart.json"];
            let mut i = 0;
            while !stop.load(Ordering::SeqCst) {
                storage.reject_writes_to(Some(documents[i % documents.len()]));
                thread::sleep(Duration::from_millis(1));
                storage.reject_writes_to(None);
                thread::sleep(Duration::from_millis(1));
                i += 1;
            }
        })
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let shop = shop.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let _ = shop.add_to_cart(user, product, 1);
                let _ = shop.checkout(user);
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    stop.store(true, Ordering::SeqCst);
    faults.join().expect("Fault thread panicked");
    storage.reject_writes_to(None);

    stop_deadlock_detector(detector);

    let balance = shop.get_user(user).unwrap().balance;
    assert!(balance >= Decimal::ZERO);
    assert_eq!(balance + spent(&shop, user), Ledger::STARTING_BALANCE);
}

/// Verifies the detector infrastructure on a plain purchase.
#[test]
fn deadlock_detector_runs_cleanly() {
    // A genuine lock cycle would leak two blocked threads into the test
    // binary, so this only checks the detector starts and stops cleanly.
    let detector = start_deadlock_detector();

    let shop = new_shop();
    let user = shop.create_user().unwrap().id;
    let product = add_product(&shop, dec!(50));
    shop.add_to_cart(user, product, 2).unwrap();
    assert_eq!(shop.checkout(user).unwrap().balance, dec!(49900));

    stop_deadlock_detector(detector);
    assert!(deadlock::check_deadlock().is_empty());
}
