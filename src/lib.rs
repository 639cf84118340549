//! Cardcart
//!
//! Cardcart picks a store for every card on a shopping list so that the item prices plus each
//! store's shipping fee come to the lowest possible total. Shipping is an arbitrary step
//! function of how many items are ordered from a store, so the choice is solved exactly as a
//! mixed-integer program.

pub mod config;
pub mod fees;
pub mod items;
pub mod listings;
pub mod matrix;
pub mod optimizer;
pub mod prelude;
pub mod pricing;
pub mod receipt;
pub mod shopping_list;
pub mod snapshot;
pub mod solvers;
pub mod stores;
