pub mod access;
pub mod cart;
pub mod history;
pub mod product;
