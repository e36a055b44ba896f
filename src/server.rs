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

//! REST API for the shop.
//!
//! ## Endpoints
//!
//! - `POST /users` - Create a user with the starting balance
//! - `GET /users/{id}/balance` - Get a user
//! - `GET /products` - List products
//! - `POST /products` - Add a product (multipart: `name`, `price`, `image`)
//! - `DELETE /products/{id}` - Delete one product
//! - `DELETE /products` - Delete several products (`{"ids": [..]}`)
//! - `POST /cart/add` - Add to a cart (`{"userId", "productId", "quantity"}`)
//! - `GET /cart/{userId}` - Cart lines resolved against the catalog
//! - `DELETE /cart/{userId}` - Empty a cart
//! - `POST /checkout` - Check out a cart (`{"userId"}`)
//! - `GET /transactions/{userId}` - A user's purchases
//! - `GET /uploads/*` - Stored product images
//!
//! `POST /generate-user` and `GET /balance/{id}` are kept as aliases.
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST http://localhost:3000/users
//! curl -X POST http://localhost:3000/products -F name=Tea -F price=100 -F image=@tea.png
//! curl -X POST http://localhost:3000/cart/add \
//!   -H "Content-Type: application/json" \
//!   -d '{"userId": 1, "productId": 1, "quantity": 3}'
//! curl -X POST http://localhost:3000/checkout \
//!   -H "Content-Type: application/json" -d '{"userId": 1}'
//! ```

use crate::{
    CartDetails, CartLine, ErrorKind, ImageUpload, Product, ProductId, PurchasedItem, Shop,
    ShopError, Transaction, User, UserId,
};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Largest accepted request body (covers image uploads).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub user_id: Option<u32>,
    pub product_id: Option<u32>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteProductsRequest {
    #[serde(default, alias = "productIds")]
    pub ids: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub message: String,
    pub product: Product,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedProductsResponse {
    pub message: String,
    pub deleted_products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub message: String,
    pub cart: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub message: String,
    pub balance: Decimal,
    pub purchased_products: Vec<PurchasedItem>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}

// === Application State ===

#[derive(Clone)]
pub struct AppState {
    pub shop: Arc<Shop>,
}

// === Error Handling ===

/// Wrapper for converting `ShopError` into HTTP responses.
pub struct AppError(ShopError);

impl From<ShopError> for AppError {
    fn from(err: ShopError) -> Self {
        AppError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(ShopError::InvalidInput(rejection.body_text()))
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError(ShopError::InvalidInput(err.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            ShopError::InvalidInput(_) => "INVALID_INPUT",
            ShopError::InvalidQuantity => "INVALID_QUANTITY",
            ShopError::EmptyCart => "EMPTY_CART",
            ShopError::UserNotFound(_) => "USER_NOT_FOUND",
            ShopError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            ShopError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ShopError::Storage(_) => "STORAGE_ERROR",
        };
        let (status, message) = match self.0.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, self.0.to_string()),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, self.0.to_string()),
            ErrorKind::InsufficientFunds => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            ErrorKind::Storage => {
                tracing::error!(error = %self.0, "request failed on storage");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "could not save changes, please try again later".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError(ShopError::invalid(format!("{field} is required"))))
}

// === Handlers ===

/// POST /users - Create a user.
async fn create_user(State(state): State<AppState>) -> Result<Json<User>, AppError> {
    Ok(Json(state.shop.create_user()?))
}

/// GET /users/{id}/balance - Get a user and their balance.
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.shop.get_user(UserId(id))?))
}

/// GET /products - List the catalog.
async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.shop.list_products())
}

/// POST /products - Add a product with an uploaded image.
async fn create_product(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProductResponse>, AppError> {
    let mut name = None;
    let mut price = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = Some(field.text().await?),
            "price" => price = Some(field.text().await?),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                image = Some(ImageUpload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let name = required(name, "product name")?;
    let price = required(price, "product price")?
        .trim()
        .parse::<Decimal>()
        .map_err(|_| AppError(ShopError::invalid("product price must be a number")))?;
    let image = required(image, "product image")?;

    let product = state.shop.add_product_with_image(name, price, image)?;
    Ok(Json(ProductResponse {
        message: "product added".to_string(),
        product,
    }))
}

/// DELETE /products/{id} - Delete one product.
async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state.shop.delete_product(ProductId(id))?;
    Ok(Json(ProductResponse {
        message: "product deleted".to_string(),
        product,
    }))
}

/// DELETE /products - Delete several products, skipping unknown ids.
async fn delete_products(
    State(state): State<AppState>,
    payload: Result<Json<DeleteProductsRequest>, JsonRejection>,
) -> Result<Json<DeletedProductsResponse>, AppError> {
    let Json(request) = payload?;
    let ids: Vec<ProductId> = request.ids.into_iter().map(ProductId).collect();
    let deleted_products = state.shop.delete_products(&ids)?;
    Ok(Json(DeletedProductsResponse {
        message: format!("deleted {} products", deleted_products.len()),
        deleted_products,
    }))
}

/// POST /cart/add - Add a product to a user's cart.
async fn add_to_cart(
    State(state): State<AppState>,
    payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, AppError> {
    let Json(request) = payload?;
    let user_id = required(request.user_id, "userId")?;
    let product_id = required(request.product_id, "productId")?;
    let quantity = required(request.quantity, "quantity")?;

    let cart = state
        .shop
        .add_to_cart(UserId(user_id), ProductId(product_id), quantity)?;
    Ok(Json(CartResponse {
        message: "added to cart".to_string(),
        cart,
    }))
}

/// GET /cart/{userId} - Resolved cart contents.
async fn get_cart(
    State(state): State<AppState>,
    Path(user_id): Path<u32>,
) -> Result<Json<CartDetails>, AppError> {
    Ok(Json(state.shop.cart_details(UserId(user_id))?))
}

/// DELETE /cart/{userId} - Empty a cart.
async fn clear_cart(
    State(state): State<AppState>,
    Path(user_id): Path<u32>,
) -> Result<Json<MessageResponse>, AppError> {
    state.shop.clear_cart(UserId(user_id))?;
    Ok(Json(MessageResponse {
        message: "cart cleared".to_string(),
    }))
}

/// POST /checkout - Buy everything in a user's cart.
async fn checkout(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let Json(request) = payload?;
    let user_id = required(request.user_id, "userId")?;
    let receipt = state.shop.checkout(UserId(user_id))?;
    Ok(Json(CheckoutResponse {
        message: "checkout completed".to_string(),
        balance: receipt.balance,
        purchased_products: receipt.purchased_products,
    }))
}

/// GET /transactions/{userId} - A user's purchase history.
async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<u32>,
) -> Json<Vec<Transaction>> {
    Json(state.shop.transactions_for(UserId(user_id)))
}

// === Router ===

/// API routes without static file serving or middleware.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/generate-user", post(create_user))
        .route("/users/{id}/balance", get(get_user))
        .route("/balance/{id}", get(get_user))
        .route(
            "/products",
            get(list_products)
                .post(create_product)
                .delete(delete_products),
        )
        .route("/products/{id}", delete(delete_product))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/{user_id}", get(get_cart).delete(clear_cart))
        .route("/checkout", post(checkout))
        .route("/transactions/{user_id}", get(list_transactions))
        .with_state(state)
}

/// Full application: API routes, uploaded images, CORS and request tracing.
pub fn app(shop: Arc<Shop>, uploads_dir: impl AsRef<std::path::Path>) -> Router {
    routes(AppState { shop })
        .nest_service("/uploads", ServeDir::new(uploads_dir.as_ref()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
