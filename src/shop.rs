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

//! The shop: catalog, ledger, carts and transaction log behind one lock.
//!
//! The [`Shop`] is the central component. Every operation takes the same
//! [`Mutex`], so operations are fully serialized even when handlers run on
//! many threads.
//!
//! # Mutations
//!
//! A mutation never edits live state directly. It clones the affected
//! store, applies the change to the copy, rewrites the backing document and
//! only then swaps the copy in. A failed validation or a failed write
//! therefore leaves both memory and the other documents as they were.
//!
//! # Checkout
//!
//! Checkout touches three documents (users, transactions, carts). They are
//! written in that order; if a later write fails the earlier ones are
//! rewritten with their previous contents before the error is returned.

use crate::base::{ProductId, UserId};
use crate::cart::{CartDetails, CartLine};
use crate::catalog::{NewProduct, Product};
use crate::checkout::{self, Receipt};
use crate::ledger::User;
use crate::storage::{self, Document, Storage};
use crate::transaction::Transaction;
use crate::{CartStore, Catalog, Ledger, ShopError, TransactionLog};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An uploaded product image.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Name of the file on the client, used only for its extension.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct ShopState {
    catalog: Catalog,
    ledger: Ledger,
    carts: CartStore,
    transactions: TransactionLog,
}

/// Shop facade owning every store.
///
/// # Invariants
///
/// - Product ids are never reused.
/// - Cart quantities are always at least 1.
/// - No balance ever goes negative.
/// - A checkout either debits, clears the cart and records a transaction,
///   or does none of these.
#[derive(Debug)]
pub struct Shop {
    state: Mutex<ShopState>,
    storage: Arc<dyn Storage>,
    uploads: AtomicU64,
}

impl Shop {
    /// Loads every store from `storage`.
    ///
    /// Documents that were never written start empty.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self, ShopError> {
        let state = ShopState {
            catalog: storage::load(storage.as_ref())?,
            ledger: storage::load(storage.as_ref())?,
            carts: storage::load(storage.as_ref())?,
            transactions: storage::load(storage.as_ref())?,
        };
        tracing::info!(
            products = state.catalog.products().len(),
            users = state.ledger.users().len(),
            transactions = state.transactions.len(),
            "shop state loaded"
        );

        Ok(Shop {
            state: Mutex::new(state),
            storage,
            uploads: AtomicU64::new(0),
        })
    }

    // === Catalog ===

    /// Adds a product whose image is already stored.
    pub fn add_product(&self, product: NewProduct) -> Result<Product, ShopError> {
        let mut state = self.state.lock();
        let product = self.commit(&mut state.catalog, |catalog| catalog.add(product))?;
        tracing::info!(product_id = %product.id, name = %product.name, "product added");
        Ok(product)
    }

    /// Stores an uploaded image and adds a product referencing it.
    ///
    /// The image is written only after the product passes validation, and is
    /// removed again if the catalog cannot be persisted.
    pub fn add_product_with_image(
        &self,
        name: String,
        price: Decimal,
        image: ImageUpload,
    ) -> Result<Product, ShopError> {
        if image.bytes.is_empty() {
            return Err(ShopError::invalid("product image is required"));
        }
        let file_name = self.image_file_name(&image.file_name);
        let new_product = NewProduct {
            name,
            price,
            image_url: storage::image_url(&file_name),
        };

        let mut state = self.state.lock();
        let mut catalog = state.catalog.clone();
        let product = catalog.add(new_product)?;

        self.storage.put_image(&file_name, &image.bytes)?;
        if let Err(err) = storage::save(self.storage.as_ref(), &catalog) {
            self.discard_image(&product.image_url);
            return Err(err.into());
        }
        state.catalog = catalog;

        tracing::info!(product_id = %product.id, name = %product.name, "product added");
        Ok(product)
    }

    /// Deletes a product and its stored image.
    pub fn delete_product(&self, id: ProductId) -> Result<Product, ShopError> {
        let mut state = self.state.lock();
        let product = self.commit(&mut state.catalog, |catalog| catalog.remove(id))?;
        self.discard_image(&product.image_url);
        tracing::info!(product_id = %product.id, "product deleted");
        Ok(product)
    }

    /// Deletes every listed product that exists and returns the removed ones.
    pub fn delete_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, ShopError> {
        if ids.is_empty() {
            return Err(ShopError::invalid("at least one product id is required"));
        }
        let mut state = self.state.lock();
        let removed = self.commit(&mut state.catalog, |catalog| Ok(catalog.remove_many(ids)))?;
        for product in &removed {
            self.discard_image(&product.image_url);
        }
        tracing::info!(
            requested = ids.len(),
            deleted = removed.len(),
            "products deleted"
        );
        Ok(removed)
    }

    pub fn list_products(&self) -> Vec<Product> {
        self.state.lock().catalog.products().to_vec()
    }

    pub fn get_product(&self, id: ProductId) -> Result<Product, ShopError> {
        self.state
            .lock()
            .catalog
            .get(id)
            .cloned()
            .ok_or(ShopError::ProductNotFound(id))
    }

    // === Ledger ===

    /// Creates a user with the starting balance.
    pub fn create_user(&self) -> Result<User, ShopError> {
        let mut state = self.state.lock();
        let user = self.commit(&mut state.ledger, |ledger| Ok(ledger.create_user()))?;
        tracing::info!(user_id = %user.id, balance = %user.balance, "user created");
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<User, ShopError> {
        self.state.lock().ledger.get(id).cloned()
    }

    // === Carts ===

    /// Adds a product to a user's cart and returns the updated lines.
    ///
    /// # Errors
    ///
    /// - [`ShopError::InvalidQuantity`] - Quantity below 1.
    /// - [`ShopError::UserNotFound`] - Unknown user.
    /// - [`ShopError::ProductNotFound`] - Unknown product.
    /// - [`ShopError::InvalidInput`] - The cart total would no longer fit in a `Decimal`.
    pub fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<CartLine>, ShopError> {
        if quantity < 1 {
            return Err(ShopError::InvalidQuantity);
        }
        let mut state = self.state.lock();
        let state = &mut *state;
        if !state.ledger.contains(user_id) {
            return Err(ShopError::UserNotFound(user_id));
        }
        if state.catalog.get(product_id).is_none() {
            return Err(ShopError::ProductNotFound(product_id));
        }
        let catalog = &state.catalog;
        let lines = self.commit(&mut state.carts, |carts| {
            let lines = carts.add(user_id, product_id, quantity)?.to_vec();
            carts.details(user_id, catalog)?;
            Ok(lines)
        })?;
        tracing::debug!(%user_id, %product_id, quantity, "cart updated");
        Ok(lines)
    }

    pub fn get_cart(&self, user_id: UserId) -> Vec<CartLine> {
        self.state.lock().carts.lines(user_id).to_vec()
    }

    pub fn clear_cart(&self, user_id: UserId) -> Result<(), ShopError> {
        let mut state = self.state.lock();
        self.commit(&mut state.carts, |carts| {
            carts.clear(user_id);
            Ok(())
        })?;
        tracing::debug!(%user_id, "cart cleared");
        Ok(())
    }

    /// Resolves a user's cart against the current catalog.
    ///
    /// # Errors
    ///
    /// [`ShopError::InvalidInput`] if the cart total does not fit in a `Decimal`.
    pub fn cart_details(&self, user_id: UserId) -> Result<CartDetails, ShopError> {
        let state = self.state.lock();
        state.carts.details(user_id, &state.catalog)
    }

    // === Checkout ===

    /// Converts a user's cart into a transaction and debits the balance.
    ///
    /// # Errors
    ///
    /// - [`ShopError::UserNotFound`] - Unknown user.
    /// - [`ShopError::EmptyCart`] - Nothing to buy.
    /// - [`ShopError::ProductNotFound`] - A cart line references a deleted product.
    /// - [`ShopError::InsufficientFunds`] - Balance below the total.
    /// - [`ShopError::Storage`] - A document could not be rewritten; nothing
    ///   was applied.
    pub fn checkout(&self, user_id: UserId) -> Result<Receipt, ShopError> {
        let mut state = self.state.lock();

        let quote = checkout::quote(user_id, &state.ledger, &state.carts, &state.catalog)
            .inspect_err(|err| tracing::warn!(%user_id, error = %err, "checkout rejected"))?;

        let mut ledger = state.ledger.clone();
        let user = ledger.debit(user_id, quote.total_price)?;
        let mut carts = state.carts.clone();
        carts.clear(user_id);
        let mut transactions = state.transactions.clone();
        transactions.record(Transaction {
            user_id,
            purchased_items: quote.purchased_items.clone(),
            total_price: quote.total_price,
            date: Utc::now(),
        });

        let storage = self.storage.as_ref();
        storage::save(storage, &ledger)?;
        if let Err(err) = storage::save(storage, &transactions) {
            self.restore(&state.ledger);
            return Err(err.into());
        }
        if let Err(err) = storage::save(storage, &carts) {
            self.restore(&state.ledger);
            self.restore(&state.transactions);
            return Err(err.into());
        }

        state.ledger = ledger;
        state.carts = carts;
        state.transactions = transactions;

        tracing::info!(
            %user_id,
            total = %quote.total_price,
            balance = %user.balance,
            items = quote.purchased_items.len(),
            "checkout completed"
        );
        Ok(Receipt {
            balance: user.balance,
            purchased_products: quote.purchased_items,
        })
    }

    // === Transactions ===

    pub fn transactions_for(&self, user_id: UserId) -> Vec<Transaction> {
        self.state.lock().transactions.for_user(user_id)
    }

    // === Helpers ===

    /// Applies `apply` to a copy of `store`, persists the copy, then publishes it.
    fn commit<D: Document, R>(
        &self,
        store: &mut D,
        apply: impl FnOnce(&mut D) -> Result<R, ShopError>,
    ) -> Result<R, ShopError> {
        let mut next = store.clone();
        let result = apply(&mut next)?;
        storage::save(self.storage.as_ref(), &next)?;
        *store = next;
        Ok(result)
    }

    /// Rewrites a document with its last committed contents.
    fn restore<D: Document>(&self, committed: &D) {
        if let Err(err) = storage::save(self.storage.as_ref(), committed) {
            tracing::error!(document = D::FILE_NAME, error = %err, "failed to restore document");
        }
    }

    fn discard_image(&self, image_url: &str) {
        let Some(file_name) = storage::image_file_name(image_url) else {
            return;
        };
        if let Err(err) = self.storage.remove_image(file_name) {
            tracing::warn!(file_name, error = %err, "failed to remove product image");
        }
    }

    /// Generates `<unix-millis>-<seq><ext>` for a new upload.
    fn image_file_name(&self, client_name: &str) -> String {
        let extension = Path::new(client_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();
        let seq = self.uploads.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}{extension}", Utc::now().timestamp_millis())
    }
}
