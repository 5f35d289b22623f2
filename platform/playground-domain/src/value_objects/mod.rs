pub mod backtest;
pub mod generate;
pub mod session;
