pub mod asset;
pub mod price;
pub mod records;
pub mod report;
pub mod settings;
pub mod strategy;
pub mod table;
pub mod valuation;
pub mod weights;
