pub mod allocation;
pub mod driver;
pub mod overflow;
