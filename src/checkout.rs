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

//! Checkout pricing and authorization.
//!
//! Checkout runs as a small state machine, terminal on the first failure:
//!
//! ```text
//!  Validate ──► Price ──► Compute ──► Authorize ──► Commit
//!     │           │                      │
//!     ▼           ▼                      ▼
//!  UserNotFound  ProductNotFound   InsufficientFunds
//!  EmptyCart
//! ```
//!
//! [`quote`] covers everything up to and including authorization and never
//! mutates anything. The commit step lives in [`crate::Shop::checkout`],
//! which applies the [`Quote`] to copies of the stores, persists them and only
//! then publishes the new state.

use crate::ShopError;
use crate::base::UserId;
use crate::cart::CartStore;
use crate::catalog::Catalog;
use crate::ledger::Ledger;
use crate::transaction::{self, PurchasedItem};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A priced and authorized checkout, ready to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub user_id: UserId,
    pub purchased_items: Vec<PurchasedItem>,
    pub total_price: Decimal,
}

/// Result of a committed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub balance: Decimal,
    pub purchased_products: Vec<PurchasedItem>,
}

/// Validates, prices and authorizes a user's cart.
///
/// # Errors
///
/// - [`ShopError::UserNotFound`] - Unknown user.
/// - [`ShopError::EmptyCart`] - The user has nothing in the cart.
/// - [`ShopError::ProductNotFound`] - A cart line references a deleted product.
/// - [`ShopError::InvalidInput`] - A line or cart total does not fit in a `Decimal`.
/// - [`ShopError::InsufficientFunds`] - The balance does not cover the total.
pub fn quote(
    user_id: UserId,
    ledger: &Ledger,
    carts: &CartStore,
    catalog: &Catalog,
) -> Result<Quote, ShopError> {
    // Validate
    let user = ledger.get(user_id)?;
    let lines = carts.lines(user_id);
    if lines.is_empty() {
        return Err(ShopError::EmptyCart);
    }

    // Price
    let purchased_items = lines
        .iter()
        .map(|line| {
            let product = catalog
                .get(line.product_id)
                .ok_or(ShopError::ProductNotFound(line.product_id))?;
            PurchasedItem::new(product.clone(), line.quantity)
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Compute
    let total_price =
        transaction::sum_amounts(purchased_items.iter().map(|i| i.item_total_price))?;

    // Authorize
    if user.balance < total_price {
        return Err(ShopError::InsufficientFunds {
            balance: user.balance,
            required: total_price,
        });
    }

    Ok(Quote {
        user_id,
        purchased_items,
        total_price,
    })
}
