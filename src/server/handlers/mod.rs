pub mod account;
pub mod health;
pub mod images;
pub mod search;
