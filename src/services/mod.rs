pub mod cart;
pub mod checkout;
pub mod orders;
pub mod pricing;
pub mod promotions;
pub mod settlement;
