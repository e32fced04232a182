pub mod activity;
pub mod category;
pub mod found_item;
pub mod report;
pub mod user;
