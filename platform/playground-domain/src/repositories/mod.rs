pub mod identity;
pub mod strategy_service;
