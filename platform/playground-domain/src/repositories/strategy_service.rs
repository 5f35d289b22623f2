use crate::errors::ClientError;
use crate::value_objects::backtest::{BacktestRequest, BacktestResponse};
use crate::value_objects::generate::{GenerateRequest, GenerateResponse};

/// Remote backtest/generation service.
pub trait StrategyService: Send + Sync {
    fn run_backtest(
        &self,
        token: &str,
        request: &BacktestRequest,
    ) -> Result<BacktestResponse, ClientError>;

    fn generate_strategy(
        &self,
        token: Option<&str>,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ClientError>;
}
