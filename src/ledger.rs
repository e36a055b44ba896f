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

//! User ledger.
//!
//! Users are created with a fixed starting balance and only ever lose
//! funds through checkout.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use shop_ledger_rs::{Ledger, UserId};
//!
//! let mut ledger = Ledger::default();
//! let user = ledger.create_user();
//! assert_eq!(user.id, UserId(1));
//! assert_eq!(user.balance, dec!(50000));
//!
//! let user = ledger.debit(user.id, dec!(300)).unwrap();
//! assert_eq!(user.balance, dec!(49700));
//! ```

use crate::ShopError;
use crate::base::UserId;
use crate::storage::Document;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A shopper with a spendable balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub balance: Decimal,
}

impl User {
    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance of user {} went negative: {}",
            self.id,
            self.balance
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    users: Vec<User>,
}

impl Document for Ledger {
    const FILE_NAME: &'static str = "users.json";
}

impl Ledger {
    /// Balance every new user starts with.
    pub const STARTING_BALANCE: Decimal = dec!(50000);

    /// Creates a user with the next id and the starting balance.
    pub fn create_user(&mut self) -> User {
        let id = self
            .users
            .iter()
            .map(|u| UserId(u.id.0 + 1))
            .max()
            .unwrap_or(UserId(1));
        let user = User {
            id,
            name: format!("Customer {id}"),
            balance: Self::STARTING_BALANCE,
        };
        self.users.push(user.clone());
        user
    }

    pub fn get(&self, id: UserId) -> Result<&User, ShopError> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or(ShopError::UserNotFound(id))
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    /// Decreases a user's balance.
    ///
    /// # Errors
    ///
    /// - [`ShopError::UserNotFound`] - No user with this id.
    /// - [`ShopError::InvalidInput`] - Amount is negative.
    /// - [`ShopError::InsufficientFunds`] - Balance is below the amount.
    pub fn debit(&mut self, id: UserId, amount: Decimal) -> Result<User, ShopError> {
        if amount < Decimal::ZERO {
            return Err(ShopError::invalid("debit amount must not be negative"));
        }
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(ShopError::UserNotFound(id))?;
        if user.balance < amount {
            return Err(ShopError::InsufficientFunds {
                balance: user.balance,
                required: amount,
            });
        }
        user.balance -= amount;
        user.assert_invariants();
        Ok(user.clone())
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }
}
