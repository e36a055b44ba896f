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

//! Per-user carts.
//!
//! A cart is an ordered list of lines, at most one per product. Adding a
//! product that is already in the cart merges the quantities.

use crate::ShopError;
use crate::base::{ProductId, UserId};
use crate::catalog::Catalog;
use crate::storage::Document;
use crate::transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display name for lines whose product has been deleted.
pub const UNKNOWN_PRODUCT: &str = "unknown product";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A cart line joined against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineDetail {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(rename = "totalPrice")]
    pub line_total: Decimal,
}

/// Resolved view of a cart for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDetails {
    #[serde(rename = "cart")]
    pub lines: Vec<CartLineDetail>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartStore {
    carts: BTreeMap<UserId, Vec<CartLine>>,
}

impl Document for CartStore {
    const FILE_NAME: &'static str = "cart.json";
}

impl CartStore {
    /// Adds `quantity` of a product to a user's cart, merging with an existing line.
    ///
    /// Returns the user's lines after the change.
    ///
    /// # Errors
    ///
    /// [`ShopError::InvalidQuantity`] if `quantity < 1` or the merged quantity
    /// does not fit in a `u32`.
    pub fn add(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<&[CartLine], ShopError> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or(ShopError::InvalidQuantity)?;

        let lines = self.carts.entry(user_id).or_default();
        match lines.iter_mut().find(|line| line.product_id == product_id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(ShopError::InvalidQuantity)?;
            }
            None => lines.push(CartLine {
                product_id,
                quantity,
            }),
        }
        Ok(lines.as_slice())
    }

    /// Returns the user's lines, empty if the user never had a cart.
    pub fn lines(&self, user_id: UserId) -> &[CartLine] {
        self.carts.get(&user_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn clear(&mut self, user_id: UserId) {
        self.carts.insert(user_id, Vec::new());
    }

    /// Joins a user's lines against the catalog.
    ///
    /// Lines whose product no longer exists are kept with a zero price so the
    /// quantity can still be shown.
    ///
    /// # Errors
    ///
    /// [`ShopError::InvalidInput`] if a line or the cart total does not fit in
    /// a `Decimal`.
    pub fn details(&self, user_id: UserId, catalog: &Catalog) -> Result<CartDetails, ShopError> {
        let lines = self
            .lines(user_id)
            .iter()
            .map(|line| match catalog.get(line.product_id) {
                Some(product) => Ok(CartLineDetail {
                    product_id: line.product_id,
                    name: product.name.clone(),
                    price: product.price,
                    quantity: line.quantity,
                    line_total: transaction::line_total(product.price, line.quantity)?,
                }),
                None => Ok(CartLineDetail {
                    product_id: line.product_id,
                    name: UNKNOWN_PRODUCT.to_string(),
                    price: Decimal::ZERO,
                    quantity: line.quantity,
                    line_total: Decimal::ZERO,
                }),
            })
            .collect::<Result<Vec<_>, ShopError>>()?;
        let total_amount = transaction::sum_amounts(lines.iter().map(|line| line.line_total))?;

        Ok(CartDetails {
            lines,
            total_amount,
        })
    }
}
