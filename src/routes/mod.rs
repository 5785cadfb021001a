pub mod catalog;
pub mod contact;
pub mod demo;
pub mod health;
pub mod payments;
