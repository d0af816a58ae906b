#![allow(dead_code)]

use matchbook_core::prelude::*;
use std::collections::HashMap;

pub struct Fma;
pub struct Fmb;

impl CoinType for Fma {}
impl CoinType for Fmb {}

pub const COIN_DECIMALS: u8 = 8;
pub const MARKET_DECIMALS: u8 = 4;
pub const MAKER: Address = 1;
pub const TAKER: Address = 2;

/// Raw price or quantity of `value` whole units at the market decimals.
pub fn units(value: u64) -> u64 {
    value * 10_u64.pow(MARKET_DECIMALS as u32)
}

/// Raw coin amount of `value` whole coins.
pub fn coins(value: u64) -> u64 {
    value * 10_u64.pow(COIN_DECIMALS as u32)
}

/// Minimal in-memory coin runtime for benchmarking.
pub struct BenchRuntime {
    instrument: HashMap<Address, u64>,
    quote: HashMap<Address, u64>,
}

impl BenchRuntime {
    pub fn new() -> Self {
        BenchRuntime {
            instrument: HashMap::new(),
            quote: HashMap::new(),
        }
    }

    pub fn fund_instrument(&mut self, owner: Address, amount: u64) {
        *self.instrument.entry(owner).or_default() += amount;
    }

    pub fn fund_quote(&mut self, owner: Address, amount: u64) {
        *self.quote.entry(owner).or_default() += amount;
    }

    fn draw(
        balances: &mut HashMap<Address, u64>,
        owner: Address,
        amount: u64,
    ) -> Result<(), CoinError> {
        let available = balances.get(&owner).copied().unwrap_or(0);
        if amount > available {
            return Err(CoinError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        balances.insert(owner, available - amount);
        Ok(())
    }
}

impl CoinRuntime<Fma> for BenchRuntime {
    fn decimals(&self) -> Option<u8> {
        Some(COIN_DECIMALS)
    }

    fn withdraw(&mut self, owner: Address, amount: u64) -> Result<Balance<Fma>, CoinError> {
        Self::draw(&mut self.instrument, owner, amount)?;
        Ok(Balance::new(amount))
    }

    fn deposit(&mut self, owner: Address, funds: Balance<Fma>) {
        *self.instrument.entry(owner).or_default() += funds.value();
    }
}

impl CoinRuntime<Fmb> for BenchRuntime {
    fn decimals(&self) -> Option<u8> {
        Some(COIN_DECIMALS)
    }

    fn withdraw(&mut self, owner: Address, amount: u64) -> Result<Balance<Fmb>, CoinError> {
        Self::draw(&mut self.quote, owner, amount)?;
        Ok(Balance::new(amount))
    }

    fn deposit(&mut self, owner: Address, funds: Balance<Fmb>) {
        *self.quote.entry(owner).or_default() += funds.value();
    }
}

/// A funded runtime and a market seeded with `asks` resting sell orders at
/// jittered prices.
pub fn seeded_market(asks: u64) -> (BenchRuntime, OrderBook<Fma, Fmb>) {
    use rand::Rng;

    let mut registry = MarketRegistry::new(MAKER);
    let mut runtime = BenchRuntime::new();
    let mut book = init_market::<Fma, Fmb, _>(
        &mut registry,
        &runtime,
        MAKER,
        MARKET_DECIMALS,
        MARKET_DECIMALS,
    )
    .expect("bench market must initialize");

    runtime.fund_instrument(MAKER, coins(asks * 10 + 1));
    let mut rng = rand::rng();
    for _ in 0..asks {
        let price = 1_000 + rng.random_range(0..500);
        book.add_limit_order(&mut runtime, MAKER, Side::Sell, units(price), units(10))
            .expect("seeding the ask side must succeed");
    }
    (runtime, book)
}
