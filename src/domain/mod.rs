//! Domain model: catalog view, cart, coupons and the events they raise.
pub mod aggregates;
pub mod events;
pub mod value_objects;
