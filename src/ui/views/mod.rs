pub mod limits;
pub mod transactions;
