pub mod types;

pub use types::{CartId, CartItemId, CategoryId, Money, OrderId, ProductId, UserId};
