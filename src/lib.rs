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

//! # Shop Ledger
//!
//! This library provides the backend of a small shop: a product catalog,
//! users with a spendable balance, per-user carts, checkout, and an
//! append-only transaction log. Each store is persisted as one JSON document.
//!
//! ## Core Components
//!
//! - [`Shop`]: Facade owning every store behind a single lock
//! - [`Catalog`]: Products with never-reused ids
//! - [`Ledger`]: Users and balances
//! - [`CartStore`]: Per-user cart lines with quantity merging
//! - [`TransactionLog`]: Completed purchases
//! - [`Storage`]: Where documents live ([`JsonFileStorage`], [`MemoryStorage`])
//! - [`server`]: axum router exposing the shop over HTTP
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use rust_decimal_macros::dec;
//! use shop_ledger_rs::{MemoryStorage, NewProduct, Shop};
//!
//! let shop = Shop::open(Arc::new(MemoryStorage::new())).unwrap();
//! let user = shop.create_user().unwrap();
//! let tea = shop
//!     .add_product(NewProduct {
//!         name: "Tea".to_string(),
//!         price: dec!(100),
//!         image_url: "/uploads/tea.png".to_string(),
//!     })
//!     .unwrap();
//!
//! shop.add_to_cart(user.id, tea.id, 3).unwrap();
//! let receipt = shop.checkout(user.id).unwrap();
//! assert_eq!(receipt.balance, dec!(49700));
//! assert!(shop.get_cart(user.id).is_empty());
//! ```
//!
//! ## Thread Safety
//!
//! [`Shop`] serializes every operation on one mutex, so a checkout is never
//! interleaved with another mutation, including a second checkout for the
//! same user.

mod base;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod server;
mod shop;
pub mod shutdown;
pub mod storage;
mod transaction;
mod transaction_log;

pub use base::{ProductId, UserId};
pub use cart::{CartDetails, CartLine, CartLineDetail, CartStore};
pub use catalog::{Catalog, NewProduct, Product};
pub use checkout::{Quote, Receipt};
pub use error::{ErrorKind, ShopError};
pub use ledger::{Ledger, User};
pub use shop::{ImageUpload, Shop};
pub use storage::{Document, JsonFileStorage, MemoryStorage, Storage, StorageError};
pub use transaction::{PurchasedItem, Transaction};
pub use transaction_log::TransactionLog;
