pub mod assembly_service;
pub mod imputation_service;
pub mod preprocessing_service;
pub mod record_service;
pub mod reshape_service;
pub mod valuation_service;
