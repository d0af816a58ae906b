use crate::coin::{CoinRuntime, CoinType};
use crate::engine::book::OrderBook;
use crate::engine::error::BookError;
use crate::engine::events::{ExecutionEvent, FinalizeEvent};
use crate::engine::types::{CancelAgent, OrderID, OrderStatus, Side};
use crate::fixed_point::{FixedPoint, RoundingMode};
use std::ops::Bound;
use tracing::trace;

impl<I: CoinType, Q: CoinType> OrderBook<I, Q> {
    /// Run the matching pipeline: drain the market-order queue newest-first,
    /// sweep, then cross the resting sides until the spread opens, and sweep
    /// again.
    pub(crate) fn process_orders<R>(&mut self, runtime: &mut R) -> Result<(), BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let queued: Vec<OrderID> = self.market_queue.iter().map(|entry| *entry.key()).collect();
        for id in queued.into_iter().rev() {
            self.execute_market_order(runtime, id)?;
        }
        self.clean_orders(runtime);

        if self.bids.is_empty() || self.asks.is_empty() {
            return Ok(());
        }
        self.execute_limit_orders(runtime)?;
        self.clean_orders(runtime);
        Ok(())
    }

    /// Cross the best bid against the best ask while the bid price covers
    /// the ask price.
    ///
    /// Each step executes the smaller remaining quantity at the spread
    /// midpoint rounded up to quote precision, so the cleared price always
    /// lies within `[ask, bid]`. Whichever side drains is finalized and the
    /// walk advances to the next best order on that side.
    fn execute_limit_orders<R>(&mut self, runtime: &mut R) -> Result<(), BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let mut bid_key = match self.bids.front() {
            Some(entry) => *entry.key(),
            None => return Ok(()),
        };
        let mut ask_key = match self.asks.front() {
            Some(entry) => *entry.key(),
            None => return Ok(()),
        };

        while bid_key.price >= ask_key.price {
            let executed = {
                let bid = self
                    .orders
                    .get(&bid_key.id)
                    .ok_or(BookError::UnknownOrder(bid_key.id))?;
                let ask = self
                    .orders
                    .get(&ask_key.id)
                    .ok_or(BookError::UnknownOrder(ask_key.id))?;
                bid.remaining_qty().min(ask.remaining_qty())
            };
            if executed.is_zero() {
                return Err(BookError::NoProgress);
            }

            let trade_price = bid_key
                .price
                .midpoint(ask_key.price)
                .round_to_decimals(self.quote_decimals(), RoundingMode::RoundUp)?;

            self.fill_pair(runtime, bid_key.id, ask_key.id, trade_price, executed)?;

            let bid_done = self.finalize_order_if_needed(bid_key.id);
            let ask_done = self.finalize_order_if_needed(ask_key.id);
            if bid_done {
                match self.bids.lower_bound(Bound::Excluded(&bid_key)) {
                    Some(entry) => bid_key = *entry.key(),
                    None => return Ok(()),
                }
            }
            if ask_done {
                match self.asks.lower_bound(Bound::Excluded(&ask_key)) {
                    Some(entry) => ask_key = *entry.key(),
                    None => return Ok(()),
                }
            }
        }
        Ok(())
    }

    /// Execute one queued market order against the best resting orders on
    /// the opposite side.
    ///
    /// Sell market orders are bounded by their remaining quantity. Buy
    /// market orders are additionally bounded by what their escrowed budget
    /// can pay for at each resting price; when the budget cannot cover a
    /// single unit at the best price the walk halts. A market order that
    /// does not finalize through fills is cancelled as immediate-or-cancel.
    fn execute_market_order<R>(
        &mut self,
        runtime: &mut R,
        market_id: OrderID,
    ) -> Result<(), BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let (market_side, market_status) = {
            let order = self
                .orders
                .get(&market_id)
                .ok_or(BookError::UnknownOrder(market_id))?;
            (order.metadata.side, order.metadata.status)
        };
        if market_status != OrderStatus::Pending {
            return Err(BookError::MarketOrderNotPending(market_id));
        }

        let resting_side = market_side.opposite();
        let front_key = {
            let map = match resting_side {
                Side::Buy => &self.bids,
                Side::Sell => &self.asks,
            };
            map.front().map(|entry| *entry.key())
        };
        let mut resting_key = match front_key {
            Some(key) => key,
            None => {
                self.cancel_residual(market_id);
                return Ok(());
            }
        };

        loop {
            // An order filled by an earlier queued market order is still in
            // the side map until the phase sweeps; walk past it.
            let resting_terminal = self
                .orders
                .get(&resting_key.id)
                .ok_or(BookError::UnknownOrder(resting_key.id))?
                .metadata
                .status
                .is_terminal();
            if resting_terminal {
                let map = match resting_side {
                    Side::Buy => &self.bids,
                    Side::Sell => &self.asks,
                };
                match map.lower_bound(Bound::Excluded(&resting_key)) {
                    Some(entry) => {
                        resting_key = *entry.key();
                        continue;
                    }
                    None => break,
                }
            }

            let executed = {
                let resting = self
                    .orders
                    .get(&resting_key.id)
                    .ok_or(BookError::UnknownOrder(resting_key.id))?;
                let market = self
                    .orders
                    .get(&market_id)
                    .ok_or(BookError::UnknownOrder(market_id))?;
                let available = resting.remaining_qty().min(market.remaining_qty());
                match market_side {
                    Side::Sell => available,
                    Side::Buy => {
                        // Bound the fill to what the escrowed budget can pay
                        // for at this resting price.
                        let budget = FixedPoint::from_u64(
                            market.buy_collateral.value(),
                            self.quote_coin_decimals(),
                        )?;
                        let affordable = budget.div(resting_key.price, RoundingMode::Trunc)?;
                        available.min(affordable)
                    }
                }
            };
            if executed.is_zero() {
                break;
            }

            let (buy_id, sell_id) = match market_side {
                Side::Buy => (market_id, resting_key.id),
                Side::Sell => (resting_key.id, market_id),
            };
            self.fill_pair(runtime, buy_id, sell_id, resting_key.price, executed)?;

            let resting_done = self.finalize_order_if_needed(resting_key.id);
            let market_done = self.finalize_order_if_needed(market_id);
            if market_done {
                break;
            }
            if resting_done {
                let map = match resting_side {
                    Side::Buy => &self.bids,
                    Side::Sell => &self.asks,
                };
                match map.lower_bound(Bound::Excluded(&resting_key)) {
                    Some(entry) => resting_key = *entry.key(),
                    None => break,
                }
            }
        }

        let status = self
            .orders
            .get(&market_id)
            .map(|order| order.metadata.status)
            .unwrap_or(OrderStatus::Pending);
        if status != OrderStatus::Filled && status != OrderStatus::PartiallyFilled {
            self.cancel_residual(market_id);
        }
        Ok(())
    }

    /// Apply one fill: decrement both remaining quantities, move collateral
    /// between the counterparties, and emit one execution event per side.
    ///
    /// The buyer pays `price * qty` quote units and the seller delivers
    /// `qty` instrument units, both truncated to coin precision so an
    /// extraction can never exceed the escrow that backs it.
    fn fill_pair<R>(
        &mut self,
        runtime: &mut R,
        buy_id: OrderID,
        sell_id: OrderID,
        price: FixedPoint,
        qty: FixedPoint,
    ) -> Result<(), BookError>
    where
        R: CoinRuntime<I> + CoinRuntime<Q>,
    {
        let buy_pay = price
            .mul(qty, RoundingMode::Trunc)?
            .to_u64(self.quote_coin_decimals(), RoundingMode::Trunc)?;
        let sell_deliver = qty.to_u64(self.instrument_coin_decimals(), RoundingMode::Trunc)?;

        let buy_owner = self
            .orders
            .get(&buy_id)
            .ok_or(BookError::UnknownOrder(buy_id))?
            .owner;
        let sell_owner = self
            .orders
            .get(&sell_id)
            .ok_or(BookError::UnknownOrder(sell_id))?
            .owner;

        let (payment, buy_metadata) = {
            let buy = self
                .orders
                .get_mut(&buy_id)
                .ok_or(BookError::UnknownOrder(buy_id))?;
            buy.metadata.remaining_qty = buy.metadata.remaining_qty.sub(qty)?;
            (buy.buy_collateral.split(buy_pay), buy.metadata)
        };
        CoinRuntime::<Q>::deposit(runtime, sell_owner, payment);

        let (delivery, sell_metadata) = {
            let sell = self
                .orders
                .get_mut(&sell_id)
                .ok_or(BookError::UnknownOrder(sell_id))?;
            sell.metadata.remaining_qty = sell.metadata.remaining_qty.sub(qty)?;
            (sell.sell_collateral.split(sell_deliver), sell.metadata)
        };
        CoinRuntime::<I>::deposit(runtime, buy_owner, delivery);

        self.events.emit_execution(ExecutionEvent {
            order_id: buy_id,
            owner: buy_owner,
            metadata: buy_metadata,
            opposite_order_id: sell_id,
            opposite_owner: sell_owner,
            opposite_metadata: sell_metadata,
            price,
            qty,
        });
        self.events.emit_execution(ExecutionEvent {
            order_id: sell_id,
            owner: sell_owner,
            metadata: sell_metadata,
            opposite_order_id: buy_id,
            opposite_owner: buy_owner,
            opposite_metadata: buy_metadata,
            price,
            qty,
        });
        trace!(buy = %buy_id, sell = %sell_id, %price, %qty, "fill");
        Ok(())
    }

    /// Finalize an order that has no quantity or no collateral left:
    /// `Filled` when the quantity is gone, `PartiallyFilled` when only the
    /// collateral is. Returns whether the order is terminal afterwards.
    fn finalize_order_if_needed(&mut self, order_id: OrderID) -> bool {
        let Some(order) = self.orders.get_mut(&order_id) else {
            return false;
        };
        if order.metadata.status.is_terminal() {
            return true;
        }

        let has_qty = !order.metadata.remaining_qty.is_zero();
        if has_qty && order.has_collateral() {
            return false;
        }
        order.metadata.status = if has_qty {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Filled
        };
        let event = FinalizeEvent {
            order_id,
            owner: order.owner,
            metadata: order.metadata,
            cancel_agent: CancelAgent::None,
        };
        self.events.emit_finalize(event);
        true
    }

    /// Cancel a market order's unfilled residual on the engine's own
    /// authority.
    fn cancel_residual(&mut self, order_id: OrderID) {
        let Some(order) = self.orders.get_mut(&order_id) else {
            return;
        };
        order.metadata.status = OrderStatus::Cancelled;
        let event = FinalizeEvent {
            order_id,
            owner: order.owner,
            metadata: order.metadata,
            cancel_agent: CancelAgent::Ioc,
        };
        self.events.emit_finalize(event);
        trace!(order = %order_id, "market order residual cancelled");
    }
}
