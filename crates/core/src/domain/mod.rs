pub mod discount;
pub mod product;
pub mod quote;
