pub mod contract;
pub mod pricing;
