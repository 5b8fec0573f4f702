//! Domain models for the API.
//!
//! These are validated domain objects, separate from the `FromRow` row types
//! that live in the `db` modules.

pub mod cart;
pub mod category;
pub mod coupon;
pub mod notification;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use cart::{Cart, CartItem, SavedItem};
pub use category::Category;
pub use coupon::Coupon;
pub use notification::Notification;
pub use order::{Order, OrderItem, ShippingAddress};
pub use product::Product;
pub use review::Review;
pub use user::{Address, User};
