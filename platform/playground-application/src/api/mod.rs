use crate::session::SessionContext;
use playground_domain::errors::ClientError;
use playground_domain::repositories::strategy_service::StrategyService;
use playground_domain::value_objects::backtest::{BacktestRequest, BacktestResponse};
use playground_domain::value_objects::generate::{GenerateRequest, GenerateResponse};
use std::sync::Arc;

/// Authenticated entry point to the backtest service.
///
/// The session is passed explicitly to each call; the token is read at call
/// time and never cached here.
#[derive(Clone)]
pub struct PlaygroundApi {
    service: Arc<dyn StrategyService>,
}

impl PlaygroundApi {
    pub fn new(service: Arc<dyn StrategyService>) -> Self {
        Self { service }
    }

    pub fn run_backtest(
        &self,
        session: &SessionContext,
        request: &BacktestRequest,
    ) -> Result<BacktestResponse, ClientError> {
        let Some(token) = session.access_token() else {
            metrics::counter!("quantplay.app.backtest.unauthenticated_total").increment(1);
            tracing::warn!(ticker = %request.ticker, "backtest refused: no session token");
            return Err(ClientError::Unauthenticated);
        };

        tracing::info!(
            ticker = %request.ticker,
            start_date = %request.start_date,
            end_date = %request.end_date,
            code_len = request.code.len(),
            "running backtest"
        );
        let result = self.service.run_backtest(&token, request);
        match &result {
            Ok(BacktestResponse::Completed { summary, .. }) => tracing::info!(
                sharpe = ?summary.sharpe,
                trading_days = ?summary.trading_days,
                "backtest completed"
            ),
            Ok(BacktestResponse::Failed { error }) => {
                tracing::info!(error = %error, "backtest reported an error")
            }
            Err(err) => tracing::warn!(kind = err.kind(), error = %err, "backtest call failed"),
        }
        result
    }

    pub fn generate_strategy(
        &self,
        session: &SessionContext,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ClientError> {
        let token = session.access_token();
        tracing::info!(
            prompt_len = request.description.len(),
            authenticated = token.is_some(),
            "generating strategy"
        );
        let result = self.service.generate_strategy(token.as_deref(), request);
        if let Err(err) = &result {
            tracing::warn!(kind = err.kind(), error = %err, "strategy generation failed");
        }
        result
    }
}
