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

//! On-disk persistence tests for [`JsonFileStorage`].

use rust_decimal_macros::dec;
use serde_json::Value;
use shop_ledger_rs::{
    CartStore, Catalog, Document, ImageUpload, JsonFileStorage, Ledger, NewProduct, ProductId,
    Shop, ShopError, TransactionLog, UserId,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn open(dir: &Path) -> Shop {
    let storage = JsonFileStorage::open(dir).unwrap();
    Shop::open(Arc::new(storage)).unwrap()
}

fn read_json(dir: &Path, name: &str) -> Value {
    serde_json::from_slice(&fs::read(dir.join(name)).unwrap()).unwrap()
}

fn tea() -> NewProduct {
    NewProduct {
        name: "Tea".to_string(),
        price: dec!(100),
        image_url: "/uploads/tea.png".to_string(),
    }
}

#[test]
fn empty_directory_opens_empty_shop() {
    let dir = tempfile::tempdir().unwrap();
    let shop = open(dir.path());

    assert!(shop.list_products().is_empty());
    assert!(dir.path().join("uploads").is_dir());
    assert!(!dir.path().join(Ledger::FILE_NAME).exists());
}

#[test]
fn documents_use_expected_layout() {
    let dir = tempfile::tempdir().unwrap();
    let shop = open(dir.path());
    let user = shop.create_user().unwrap();
    let product = shop.add_product(tea()).unwrap();
    shop.add_to_cart(user.id, product.id, 2).unwrap();

    let users = read_json(dir.path(), Ledger::FILE_NAME);
    assert_eq!(users[0]["id"], 1);
    assert_eq!(users[0]["name"], "Customer 1");
    assert_eq!(users[0]["balance"].as_f64(), Some(50000.0));

    let products = read_json(dir.path(), Catalog::FILE_NAME);
    assert_eq!(products["nextId"], 2);
    assert_eq!(products["products"][0]["imageUrl"], "/uploads/tea.png");

    let carts = read_json(dir.path(), CartStore::FILE_NAME);
    assert_eq!(carts["1"][0]["productId"], 1);
    assert_eq!(carts["1"][0]["quantity"], 2);

    shop.checkout(user.id).unwrap();
    let transactions = read_json(dir.path(), TransactionLog::FILE_NAME);
    assert_eq!(transactions[0]["userId"], 1);
    assert_eq!(transactions[0]["products"][0]["itemTotalPrice"].as_f64(), Some(200.0));
    assert!(transactions[0]["date"].is_string());

    let carts = read_json(dir.path(), CartStore::FILE_NAME);
    assert_eq!(carts["1"], Value::Array(Vec::new()));
}

#[test]
fn reopening_restores_every_store() {
    let dir = tempfile::tempdir().unwrap();
    {
        let shop = open(dir.path());
        let user = shop.create_user().unwrap();
        let product = shop.add_product(tea()).unwrap();
        shop.add_to_cart(user.id, product.id, 1).unwrap();
        shop.checkout(user.id).unwrap();
        shop.add_to_cart(user.id, product.id, 4).unwrap();
        shop.delete_product(product.id).unwrap();
    }

    let shop = open(dir.path());
    assert_eq!(shop.get_user(UserId(1)).unwrap().balance, dec!(49900));
    assert_eq!(shop.get_cart(UserId(1))[0].quantity, 4);
    assert_eq!(shop.transactions_for(UserId(1)).len(), 1);

    // Deleted id 1 stays retired across restarts
    assert_eq!(shop.add_product(tea()).unwrap().id, ProductId(2));
}

#[test]
fn prices_reopen_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let prices = [dec!(19.99), dec!(0.1), dec!(1234567.891), dec!(99999999.99)];
    {
        let shop = open(dir.path());
        for price in prices {
            shop.add_product(NewProduct { price, ..tea() }).unwrap();
        }
        assert_eq!(
            shop.add_product(NewProduct {
                price: dec!(12345678901234567.89),
                ..tea()
            }),
            Err(ShopError::InvalidInput(
                "product price has too many significant digits".to_string()
            ))
        );
    }

    let shop = open(dir.path());
    let reopened: Vec<_> = shop.list_products().iter().map(|p| p.price).collect();
    assert_eq!(reopened, prices);
}

#[test]
fn failed_write_keeps_previous_document() {
    let dir = tempfile::tempdir().unwrap();
    let shop = open(dir.path());
    let user = shop.create_user().unwrap();
    let product = shop.add_product(tea()).unwrap();
    shop.add_to_cart(user.id, product.id, 2).unwrap();
    let users = fs::read(dir.path().join(Ledger::FILE_NAME)).unwrap();

    // A directory in the staging path makes the next users.json write fail
    let staged = dir.path().join(format!(".{}.tmp", Ledger::FILE_NAME));
    fs::create_dir(&staged).unwrap();

    assert!(matches!(shop.create_user(), Err(ShopError::Storage(_))));
    assert!(matches!(shop.checkout(user.id), Err(ShopError::Storage(_))));
    assert_eq!(fs::read(dir.path().join(Ledger::FILE_NAME)).unwrap(), users);

    let reopened = open(dir.path());
    assert_eq!(reopened.get_user(user.id).unwrap().balance, dec!(50000));
    assert!(reopened.get_user(UserId(2)).is_err());
    assert_eq!(reopened.get_cart(user.id)[0].quantity, 2);

    fs::remove_dir(&staged).unwrap();
    shop.checkout(user.id).unwrap();
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "staging files left behind: {leftovers:?}");
}

#[test]
fn legacy_product_array_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(Catalog::FILE_NAME),
        r#"[
            {"id": 1, "name": "Tea", "price": 10, "imageUrl": "/uploads/a.png"},
            {"id": 4, "name": "Cup", "price": 2.5, "imageUrl": "/uploads/b.png"}
        ]"#,
    )
    .unwrap();

    let shop = open(dir.path());
    assert_eq!(shop.list_products().len(), 2);
    assert_eq!(shop.get_product(ProductId(4)).unwrap().price, dec!(2.5));
    assert_eq!(shop.add_product(tea()).unwrap().id, ProductId(5));

    let products = read_json(dir.path(), Catalog::FILE_NAME);
    assert_eq!(products["nextId"], 6);
}

#[test]
fn malformed_document_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(Ledger::FILE_NAME), "{oops").unwrap();

    let storage = JsonFileStorage::open(dir.path()).unwrap();
    assert!(matches!(
        Shop::open(Arc::new(storage)),
        Err(ShopError::Storage(_))
    ));
}

#[test]
fn uploaded_images_land_in_uploads_dir() {
    let dir = tempfile::tempdir().unwrap();
    let shop = open(dir.path());

    let product = shop
        .add_product_with_image(
            "Tea".to_string(),
            dec!(3),
            ImageUpload {
                file_name: "tea.webp".to_string(),
                bytes: b"webp".to_vec(),
            },
        )
        .unwrap();
    let file_name = product.image_url.trim_start_matches("/uploads/");
    let path = dir.path().join("uploads").join(file_name);
    assert_eq!(fs::read(&path).unwrap(), b"webp");

    shop.delete_product(product.id).unwrap();
    assert!(!path.exists());
}

#[test]
fn externally_hosted_images_are_left_alone_on_delete() {
    let dir = tempfile::tempdir().unwrap();
    let outside = dir.path().join("keep.png");
    fs::write(&outside, b"png").unwrap();

    let shop = open(dir.path());
    let product = shop
        .add_product(NewProduct {
            image_url: "https://cdn.example.com/keep.png".to_string(),
            ..tea()
        })
        .unwrap();
    shop.delete_product(product.id).unwrap();
    assert!(outside.exists());
}
