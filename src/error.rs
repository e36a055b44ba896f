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

//! Error types for shop operations.

use crate::base::{ProductId, UserId};
use crate::storage::StorageError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Shop operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopError {
    /// A required field is missing or malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Cart quantity is below one or would overflow
    #[error("invalid quantity (must be at least 1)")]
    InvalidQuantity,

    /// Checkout was attempted on an empty cart
    #[error("cart is empty, nothing to check out")]
    EmptyCart,

    /// Referenced user does not exist
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// Referenced product does not exist
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Balance does not cover the requested amount
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Decimal, required: Decimal },

    /// Persisting a document failed
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Coarse classification of a [`ShopError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    Storage,
}

impl ShopError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidQuantity | Self::EmptyCart => {
                ErrorKind::Validation
            }
            Self::UserNotFound(_) | Self::ProductNotFound(_) => ErrorKind::NotFound,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<StorageError> for ShopError {
    fn from(err: StorageError) -> Self {
        ShopError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn error_display_messages() {
        assert_eq!(
            ShopError::invalid("name is required").to_string(),
            "invalid input: name is required"
        );
        assert_eq!(
            ShopError::InvalidQuantity.to_string(),
            "invalid quantity (must be at least 1)"
        );
        assert_eq!(
            ShopError::EmptyCart.to_string(),
            "cart is empty, nothing to check out"
        );
        assert_eq!(ShopError::UserNotFound(UserId(4)).to_string(), "user 4 not found");
        assert_eq!(
            ShopError::ProductNotFound(ProductId(9)).to_string(),
            "product 9 not found"
        );
        assert_eq!(
            ShopError::InsufficientFunds {
                balance: dec!(100),
                required: dec!(150),
            }
            .to_string(),
            "insufficient funds: balance 100, required 150"
        );
    }

    #[test]
    fn errors_are_classified() {
        assert_eq!(ShopError::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(ShopError::InvalidQuantity.kind(), ErrorKind::Validation);
        assert_eq!(ShopError::UserNotFound(UserId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(
            ShopError::ProductNotFound(ProductId(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ShopError::InsufficientFunds {
                balance: dec!(0),
                required: dec!(1),
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
        assert_eq!(ShopError::Storage("disk full".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn storage_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: ShopError = StorageError::Io {
            document: "users.json".to_string(),
            source: io,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().contains("users.json"));
    }
}
