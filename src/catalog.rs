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

//! Product catalog.
//!
//! The catalog is an ordered list of products plus a high-water mark for
//! identifiers, so an id is never handed out twice even after the product
//! holding it is deleted.

use crate::ShopError;
use crate::base::ProductId;
use crate::storage::Document;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
}

/// Input for [`Catalog::add`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
}

impl NewProduct {
    fn validate(self) -> Result<Self, ShopError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ShopError::invalid("product name is required"));
        }
        if self.price <= Decimal::ZERO {
            return Err(ShopError::invalid("product price must be positive"));
        }
        if !survives_storage(self.price) {
            return Err(ShopError::invalid("product price has too many significant digits"));
        }
        if self.image_url.trim().is_empty() {
            return Err(ShopError::invalid("product image is required"));
        }
        Ok(Self {
            name: name.to_string(),
            ..self
        })
    }
}

/// Prices are stored as JSON numbers, so only values that read back
/// unchanged are accepted.
fn survives_storage(price: Decimal) -> bool {
    serde_json::to_vec(&price)
        .and_then(|json| serde_json::from_slice::<Decimal>(&json))
        .is_ok_and(|stored| stored == price)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    next_id: ProductId,
    products: Vec<Product>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            next_id: ProductId(1),
            products: Vec::new(),
        }
    }
}

impl Document for Catalog {
    const FILE_NAME: &'static str = "products.json";
}

/// Accepts both the current `{nextId, products}` layout and a bare product array.
impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Current {
                #[serde(rename = "nextId")]
                next_id: ProductId,
                products: Vec<Product>,
            },
            Legacy(Vec<Product>),
        }

        let (next_id, products) = match Stored::deserialize(deserializer)? {
            Stored::Current { next_id, products } => (next_id, products),
            Stored::Legacy(products) => (ProductId(1), products),
        };
        let floor = products
            .iter()
            .map(|p| p.id.next())
            .max()
            .unwrap_or(ProductId(1));

        Ok(Self {
            next_id: next_id.max(floor),
            products,
        })
    }
}

impl Catalog {
    /// Validates and appends a product, assigning the next id.
    pub fn add(&mut self, product: NewProduct) -> Result<Product, ShopError> {
        let NewProduct {
            name,
            price,
            image_url,
        } = product.validate()?;

        let product = Product {
            id: self.next_id,
            name,
            price,
            image_url,
        };
        self.next_id = self.next_id.next();
        self.products.push(product.clone());
        Ok(product)
    }

    pub fn remove(&mut self, id: ProductId) -> Result<Product, ShopError> {
        let index = self
            .products
            .iter()
            .position(|p| p.id == id)
            .ok_or(ShopError::ProductNotFound(id))?;
        Ok(self.products.remove(index))
    }

    /// Removes every listed product that exists; unknown ids are skipped.
    pub fn remove_many(&mut self, ids: &[ProductId]) -> Vec<Product> {
        ids.iter().filter_map(|id| self.remove(*id).ok()).collect()
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn next_id(&self) -> ProductId {
        self.next_id
    }
}
