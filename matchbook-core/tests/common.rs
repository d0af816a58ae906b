#![allow(dead_code)]

use matchbook_core::prelude::*;
use std::collections::HashMap;

/// Instrument coin used across the integration tests.
pub struct Fma;
/// Quote coin used across the integration tests.
pub struct Fmb;

impl CoinType for Fma {}
impl CoinType for Fmb {}

pub const COIN_DECIMALS: u8 = 8;
pub const MARKET_DECIMALS: u8 = 4;
pub const ADMIN: Address = 1;

/// In-memory stand-in for the external coin runtime: one free-balance table
/// per coin, both declaring 8 decimal places unless overridden.
pub struct TestRuntime {
    instrument_decimals: Option<u8>,
    quote_decimals: Option<u8>,
    instrument: HashMap<Address, u64>,
    quote: HashMap<Address, u64>,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self::with_decimals(Some(COIN_DECIMALS), Some(COIN_DECIMALS))
    }

    /// Override the declared decimals; `None` models an uninitialized coin.
    pub fn with_decimals(instrument_decimals: Option<u8>, quote_decimals: Option<u8>) -> Self {
        TestRuntime {
            instrument_decimals,
            quote_decimals,
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

    pub fn instrument_balance(&self, owner: Address) -> u64 {
        self.instrument.get(&owner).copied().unwrap_or(0)
    }

    pub fn quote_balance(&self, owner: Address) -> u64 {
        self.quote.get(&owner).copied().unwrap_or(0)
    }

    /// Free instrument units across all accounts.
    pub fn total_instrument(&self) -> u64 {
        self.instrument.values().sum()
    }

    /// Free quote units across all accounts.
    pub fn total_quote(&self) -> u64 {
        self.quote.values().sum()
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

impl CoinRuntime<Fma> for TestRuntime {
    fn decimals(&self) -> Option<u8> {
        self.instrument_decimals
    }

    fn withdraw(&mut self, owner: Address, amount: u64) -> Result<Balance<Fma>, CoinError> {
        Self::draw(&mut self.instrument, owner, amount)?;
        Ok(Balance::new(amount))
    }

    fn deposit(&mut self, owner: Address, funds: Balance<Fma>) {
        *self.instrument.entry(owner).or_default() += funds.value();
    }
}

impl CoinRuntime<Fmb> for TestRuntime {
    fn decimals(&self) -> Option<u8> {
        self.quote_decimals
    }

    fn withdraw(&mut self, owner: Address, amount: u64) -> Result<Balance<Fmb>, CoinError> {
        Self::draw(&mut self.quote, owner, amount)?;
        Ok(Balance::new(amount))
    }

    fn deposit(&mut self, owner: Address, funds: Balance<Fmb>) {
        *self.quote.entry(owner).or_default() += funds.value();
    }
}

/// A raw price or quantity of `value` whole units at the market's 4 decimal
/// places.
pub fn units(value: u64) -> u64 {
    value * 10_u64.pow(MARKET_DECIMALS as u32)
}

/// A raw coin amount of `value` whole coins at 8 decimal places.
pub fn coins(value: u64) -> u64 {
    value * 10_u64.pow(COIN_DECIMALS as u32)
}

/// A fixed point of `value` whole units.
pub fn fp(value: u64) -> FixedPoint {
    FixedPoint::from_u64(value, 0).unwrap()
}

/// Fresh registry, runtime, and FMA/FMB market at 4+4 decimals.
pub fn setup_market() -> (MarketRegistry, TestRuntime, OrderBook<Fma, Fmb>) {
    let mut registry = MarketRegistry::new(ADMIN);
    let runtime = TestRuntime::new();
    let book = init_market::<Fma, Fmb, _>(
        &mut registry,
        &runtime,
        ADMIN,
        MARKET_DECIMALS,
        MARKET_DECIMALS,
    )
    .expect("market setup must succeed");
    (registry, runtime, book)
}

/// Instrument and quote totals counting both free balances and the escrow
/// still held by resting orders. Conservation says these never change.
pub fn totals_with_escrow(runtime: &TestRuntime, book: &OrderBook<Fma, Fmb>) -> (u64, u64) {
    let mut instrument = runtime.total_instrument();
    let mut quote = runtime.total_quote();
    for side in [Side::Buy, Side::Sell] {
        for order in book.side_orders(side) {
            instrument += order.sell_collateral.value();
            quote += order.buy_collateral.value();
        }
    }
    (instrument, quote)
}

#[test]
fn test_runtime_withdraw_deposit_round_trip() {
    let mut runtime = TestRuntime::new();
    runtime.fund_quote(7, coins(3));

    let escrow: Balance<Fmb> =
        CoinRuntime::<Fmb>::withdraw(&mut runtime, 7, coins(1)).expect("funded withdrawal");
    assert_eq!(runtime.quote_balance(7), coins(2));

    CoinRuntime::<Fmb>::deposit(&mut runtime, 7, escrow);
    assert_eq!(runtime.quote_balance(7), coins(3));

    let refused = CoinRuntime::<Fmb>::withdraw(&mut runtime, 7, coins(4));
    assert!(matches!(
        refused,
        Err(CoinError::InsufficientBalance { .. })
    ));
}
