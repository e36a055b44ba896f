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

//! Completed purchase records.

use crate::ShopError;
use crate::base::UserId;
use crate::catalog::Product;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product snapshot taken at checkout, with the purchased quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasedItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
    pub item_total_price: Decimal,
}

impl PurchasedItem {
    /// Snapshots `product` at `quantity` units.
    ///
    /// # Errors
    ///
    /// [`ShopError::InvalidInput`] if the item total does not fit in a `Decimal`.
    pub fn new(product: Product, quantity: u32) -> Result<Self, ShopError> {
        let item_total_price = line_total(product.price, quantity)?;
        Ok(Self {
            product,
            quantity,
            item_total_price,
        })
    }
}

/// `price * quantity`, or an error when the product overflows.
pub(crate) fn line_total(price: Decimal, quantity: u32) -> Result<Decimal, ShopError> {
    price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(out_of_range)
}

/// Sums money amounts, or an error when the sum overflows.
pub(crate) fn sum_amounts(
    amounts: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal, ShopError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or_else(out_of_range)
}

fn out_of_range() -> ShopError {
    ShopError::invalid("amount out of range")
}

/// Immutable record of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub user_id: UserId,
    #[serde(rename = "products")]
    pub purchased_items: Vec<PurchasedItem>,
    pub total_price: Decimal,
    pub date: DateTime<Utc>,
}
