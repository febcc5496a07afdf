//! Synthetic order flow.
//!
//! Deterministic, configurable request stream for invariant tests, demos, and
//! load runs. Same seed ⇒ same sequence of requests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::engine::{MatchingEngine, SubmissionResult};
use crate::types::{OrderRequest, OrderType, Side};

/// Configuration for the synthetic request generator. All ranges are
/// inclusive; the type ratios should sum to at most 1.0, the rest is limit.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// RNG seed. Same seed ⇒ same request stream.
    pub seed: u64,
    /// Symbol for all generated requests.
    pub symbol: String,
    /// Number of requests produced by [`Generator::all_requests`].
    pub num_orders: usize,
    /// Probability of Buy (0.0..=1.0). Sell otherwise.
    pub buy_ratio: f64,
    /// Probability of a market order.
    pub market_ratio: f64,
    /// Probability of an IOC order.
    pub ioc_ratio: f64,
    /// Probability of a FOK order. Remaining probability mass is limit.
    pub fok_ratio: f64,
    /// Price range (inclusive) for priced orders.
    pub price_min: i64,
    pub price_max: i64,
    /// Quantity range (inclusive), whole units.
    pub quantity_min: u64,
    pub quantity_max: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            symbol: "BTC-USDT".into(),
            num_orders: 1000,
            buy_ratio: 0.5,
            market_ratio: 0.05,
            ioc_ratio: 0.05,
            fok_ratio: 0.02,
            price_min: 49_950,
            price_max: 50_050,
            quantity_min: 1,
            quantity_max: 100,
        }
    }
}

/// Deterministic request stream. Create with [`Generator::new`]; pull
/// requests one at a time or in bulk.
pub struct Generator {
    rng: StdRng,
    config: GeneratorConfig,
}

impl Generator {
    /// Builds a generator. Same config (including seed) ⇒ same stream.
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self { rng, config }
    }

    /// Generates the next request, advancing the RNG.
    pub fn next_request(&mut self) -> OrderRequest {
        let side = if self.rng.gen::<f64>() < self.config.buy_ratio {
            Side::Buy
        } else {
            Side::Sell
        };
        let price = Decimal::from(
            self.rng
                .gen_range(self.config.price_min..=self.config.price_max),
        );
        let roll = self.rng.gen::<f64>();
        let order_type = if roll < self.config.market_ratio {
            OrderType::Market
        } else if roll < self.config.market_ratio + self.config.ioc_ratio {
            OrderType::Ioc { price }
        } else if roll < self.config.market_ratio + self.config.ioc_ratio + self.config.fok_ratio {
            OrderType::Fok { price }
        } else {
            OrderType::Limit { price }
        };
        let quantity = Decimal::from(
            self.rng
                .gen_range(self.config.quantity_min..=self.config.quantity_max),
        );
        OrderRequest {
            symbol: self.config.symbol.clone(),
            side,
            order_type,
            quantity,
        }
    }

    /// Returns exactly `n` requests, advancing the generator state.
    pub fn take_requests(&mut self, n: usize) -> Vec<OrderRequest> {
        (0..n).map(|_| self.next_request()).collect()
    }

    /// Returns the full stream as defined by `config.num_orders`.
    pub fn all_requests(&mut self) -> Vec<OrderRequest> {
        self.take_requests(self.config.num_orders)
    }
}

/// Replays a request sequence into the engine, collecting every result.
pub fn replay_into_engine(
    engine: &MatchingEngine,
    requests: impl IntoIterator<Item = OrderRequest>,
) -> Vec<SubmissionResult> {
    requests
        .into_iter()
        .map(|request| engine.submit(request))
        .collect()
}
