use crate::coin::{Balance, CoinRuntime, CoinType};
use crate::engine::error::BookError;
use crate::engine::events::{CreateEvent, EventLog, FinalizeEvent};
use crate::engine::types::{
    Address, BookKey, CancelAgent, Order, OrderID, OrderMetadata, OrderStatus, OrderType, Side,
};
use crate::fixed_point::{FixedPoint, RoundingMode};
use crate::registry::CustodianCapability;
use crossbeam_skiplist::SkipMap;
use std::collections::HashMap;
use tracing::{debug, trace};

/// OrderBook is the matching engine for one market of the pair `(I, Q)`.
///
/// Both sides are skip maps keyed by [`BookKey`], so the front of a map is
/// always the best order on that side and iteration walks inward in strict
/// price-time priority. Market orders queue separately and never rest.
///
/// Every public entry point is one atomic step: validation and fallible
/// arithmetic run before any state changes, an error aborts the whole step,
/// and the hosting runtime rolls back balance movements on abort. The
/// mutable receiver serializes callers per book; distinct books are
/// independent.
pub struct OrderBook<I: CoinType, Q: CoinType> {
    /// Account the book was created at.
    owner: Address,
    /// Quantity precision for the instrument, in decimal places.
    i_decimals: u8,
    /// Price precision for the quote, in decimal places.
    q_decimals: u8,
    /// Declared decimals of the instrument coin, cached at init.
    i_coin_decimals: u8,
    /// Declared decimals of the quote coin, cached at init.
    q_coin_decimals: u8,
    /// Next order id; assignment order doubles as time priority.
    id_counter: u128,
    /// Queued market orders by id; consumed newest-first.
    pub(crate) market_queue: SkipMap<OrderID, ()>,
    /// Resting buy orders, best (highest price, earliest id) at the front.
    pub(crate) bids: SkipMap<BookKey, ()>,
    /// Resting sell orders, best (lowest price, earliest id) at the front.
    pub(crate) asks: SkipMap<BookKey, ()>,
    /// Active orders by id; every member is `Pending`.
    pub(crate) orders: HashMap<OrderID, Order<I, Q>>,
    /// Terminal orders, retained for query.
    finalized: HashMap<OrderID, Order<I, Q>>,
    pub(crate) events: EventLog,
}

impl<I: CoinType, Q: CoinType> OrderBook<I, Q> {
    /// Build an empty book. Callers go through `init_market`, which
    /// validates the decimal configuration against the coin pair first.
    pub(crate) fn new(
        owner: Address,
        i_decimals: u8,
        q_decimals: u8,
        i_coin_decimals: u8,
        q_coin_decimals: u8,
    ) -> Self {
        Self {
            owner,
            i_decimals,
            q_decimals,
            i_coin_decimals,
            q_coin_decimals,
            id_counter: 0,
            market_queue: SkipMap::new(),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            orders: HashMap::new(),
            finalized: HashMap::new(),
            events: EventLog::new(),
        }
    }

    /// Accept a limit order: escrow collateral, rest it on its side, and run
    /// the matching pipeline.
    ///
    /// `price_raw` is interpreted at the market's quote decimals and
    /// `qty_raw` at its instrument decimals. Buys escrow
    /// `price * qty` quote units rounded up; sells escrow the quantity in
    /// instrument units rounded up.
    pub fn add_limit_order<R>(
        &mut self,
        runtime: &mut R,
        owner: Address,
        side: Side,
        price_raw: u64,
        qty_raw: u64,
    ) -> Result<OrderID, BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let price = FixedPoint::from_u64(price_raw, self.q_decimals)?;
        let qty = FixedPoint::from_u64(qty_raw, self.i_decimals)?;
        if price.is_zero() || qty.is_zero() {
            return Err(BookError::InvalidPrice);
        }

        let (buy_collateral, sell_collateral) = match side {
            Side::Buy => {
                let cost = price
                    .mul(qty, RoundingMode::RoundUp)?
                    .to_u64(self.q_coin_decimals, RoundingMode::RoundUp)?;
                let funds = CoinRuntime::<Q>::withdraw(runtime, owner, cost)?;
                (funds, Balance::zero())
            }
            Side::Sell => {
                let units = qty.to_u64(self.i_coin_decimals, RoundingMode::RoundUp)?;
                let funds = CoinRuntime::<I>::withdraw(runtime, owner, units)?;
                (Balance::zero(), funds)
            }
        };

        let metadata = OrderMetadata {
            side,
            order_type: OrderType::Limit,
            status: OrderStatus::Pending,
            price,
            original_qty: qty,
            remaining_qty: qty,
        };
        let id = self.insert_order(owner, metadata, buy_collateral, sell_collateral);
        debug!(order = %id, ?side, %price, %qty, "limit order accepted");

        self.process_orders(runtime)?;
        Ok(id)
    }

    /// Accept a market order and run the matching pipeline. Market orders are
    /// immediate-or-cancel; whatever the pipeline cannot fill is cancelled by
    /// the engine and the residual escrow refunded.
    ///
    /// Buys escrow exactly `max_collateral` quote units, the budget that
    /// bounds how much can execute. Sells escrow the quantity in instrument
    /// units rounded up.
    pub fn add_market_order<R>(
        &mut self,
        runtime: &mut R,
        owner: Address,
        side: Side,
        qty_raw: u64,
        max_collateral: u64,
    ) -> Result<OrderID, BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let qty = FixedPoint::from_u64(qty_raw, self.i_decimals)?;
        if qty.is_zero() {
            return Err(BookError::InvalidPrice);
        }

        let (buy_collateral, sell_collateral) = match side {
            Side::Buy => {
                let funds = CoinRuntime::<Q>::withdraw(runtime, owner, max_collateral)?;
                (funds, Balance::zero())
            }
            Side::Sell => {
                let units = qty.to_u64(self.i_coin_decimals, RoundingMode::RoundUp)?;
                let funds = CoinRuntime::<I>::withdraw(runtime, owner, units)?;
                (Balance::zero(), funds)
            }
        };

        let metadata = OrderMetadata {
            side,
            order_type: OrderType::Market,
            status: OrderStatus::Pending,
            price: FixedPoint::ZERO,
            original_qty: qty,
            remaining_qty: qty,
        };
        let id = self.insert_order(owner, metadata, buy_collateral, sell_collateral);
        debug!(order = %id, ?side, %qty, budget = max_collateral, "market order accepted");

        self.process_orders(runtime)?;
        Ok(id)
    }

    /// Cancel an active order on behalf of its owner. The order transitions
    /// to `Cancelled` and the sweep refunds all residual escrow.
    pub fn cancel_order<R>(
        &mut self,
        runtime: &mut R,
        caller: Address,
        order_id: OrderID,
    ) -> Result<(), BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(BookError::UnknownOrder(order_id))?;
        if order.owner != caller {
            return Err(BookError::NotOwner(order_id));
        }

        order.metadata.status = OrderStatus::Cancelled;
        let event = FinalizeEvent {
            order_id,
            owner: order.owner,
            metadata: order.metadata,
            cancel_agent: CancelAgent::User,
        };
        self.events.emit_finalize(event);
        debug!(order = %order_id, "order cancelled by owner");

        self.clean_orders(runtime);
        Ok(())
    }

    /// Place a limit order for the user a custodian capability vouches for.
    pub fn add_limit_order_with_capability<R>(
        &mut self,
        runtime: &mut R,
        capability: &CustodianCapability,
        side: Side,
        price_raw: u64,
        qty_raw: u64,
    ) -> Result<OrderID, BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        self.add_limit_order(runtime, capability.user(), side, price_raw, qty_raw)
    }

    /// Place a market order for the user a custodian capability vouches for.
    pub fn add_market_order_with_capability<R>(
        &mut self,
        runtime: &mut R,
        capability: &CustodianCapability,
        side: Side,
        qty_raw: u64,
        max_collateral: u64,
    ) -> Result<OrderID, BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        self.add_market_order(runtime, capability.user(), side, qty_raw, max_collateral)
    }

    /// Cancel an order for the user a custodian capability vouches for.
    pub fn cancel_order_with_capability<R>(
        &mut self,
        runtime: &mut R,
        capability: &CustodianCapability,
        order_id: OrderID,
    ) -> Result<(), BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        self.cancel_order(runtime, capability.user(), order_id)
    }

    /// Sweep every terminal order out of the book's active state: drop it
    /// from its side structure and the active table, refund all residual
    /// escrow to its owner, and retain it in the finalized table.
    ///
    /// Running the sweep twice is the same as running it once.
    pub fn clean_orders<R>(&mut self, runtime: &mut R)
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let mut swept: Vec<OrderID> = Vec::new();

        let orders = &self.orders;
        let terminal = |id: &OrderID| {
            orders
                .get(id)
                .is_some_and(|order| order.metadata.status.is_terminal())
        };

        for side in [&self.bids, &self.asks] {
            let keys: Vec<BookKey> = side
                .iter()
                .filter(|entry| terminal(&entry.key().id))
                .map(|entry| *entry.key())
                .collect();
            for key in keys {
                side.remove(&key);
                swept.push(key.id);
            }
        }
        let queued: Vec<OrderID> = self
            .market_queue
            .iter()
            .filter(|entry| terminal(entry.key()))
            .map(|entry| *entry.key())
            .collect();
        for id in queued {
            self.market_queue.remove(&id);
            swept.push(id);
        }

        for id in swept {
            let Some(mut order) = self.orders.remove(&id) else {
                continue;
            };
            let residual_quote = order.buy_collateral.take_all();
            let residual_instrument = order.sell_collateral.take_all();
            trace!(
                order = %id,
                status = ?order.metadata.status,
                quote_refund = residual_quote.value(),
                instrument_refund = residual_instrument.value(),
                "order swept"
            );
            CoinRuntime::<Q>::deposit(runtime, order.owner, residual_quote);
            CoinRuntime::<I>::deposit(runtime, order.owner, residual_instrument);
            self.finalized.insert(id, order);
        }
    }

    /// Look up an active order.
    pub fn order(&self, order_id: OrderID) -> Option<&Order<I, Q>> {
        self.orders.get(&order_id)
    }

    /// Look up a finalized order.
    pub fn finalized_order(&self, order_id: OrderID) -> Option<&Order<I, Q>> {
        self.finalized.get(&order_id)
    }

    /// The highest resting bid price.
    pub fn best_bid(&self) -> Option<FixedPoint> {
        self.bids.front().map(|entry| entry.key().price)
    }

    /// The lowest resting ask price.
    pub fn best_ask(&self) -> Option<FixedPoint> {
        self.asks.front().map(|entry| entry.key().price)
    }

    /// Resting orders on a side, best first.
    pub fn side_orders(&self, side: Side) -> Vec<&Order<I, Q>> {
        let map = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        map.iter()
            .filter_map(|entry| self.orders.get(&entry.key().id))
            .collect()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Quantity precision in decimal places.
    pub fn instrument_decimals(&self) -> u8 {
        self.i_decimals
    }

    /// Price precision in decimal places.
    pub fn quote_decimals(&self) -> u8 {
        self.q_decimals
    }

    pub(crate) fn instrument_coin_decimals(&self) -> u8 {
        self.i_coin_decimals
    }

    pub(crate) fn quote_coin_decimals(&self) -> u8 {
        self.q_coin_decimals
    }

    fn insert_order(
        &mut self,
        owner: Address,
        metadata: OrderMetadata,
        buy_collateral: Balance<Q>,
        sell_collateral: Balance<I>,
    ) -> OrderID {
        let id = self.id_counter;
        self.id_counter += 1;

        let order = Order {
            id,
            owner,
            metadata,
            buy_collateral,
            sell_collateral,
        };
        match metadata.order_type {
            OrderType::Limit => {
                let key = order.book_key();
                match metadata.side {
                    Side::Buy => {
                        self.bids.insert(key, ());
                    }
                    Side::Sell => {
                        self.asks.insert(key, ());
                    }
                }
            }
            OrderType::Market => {
                self.market_queue.insert(id, ());
            }
        }
        self.events.emit_create(CreateEvent {
            order_id: id,
            owner,
            metadata,
        });
        self.orders.insert(id, order);
        id
    }
}
