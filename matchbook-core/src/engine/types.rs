use crate::coin::{Balance, CoinType};
use crate::engine::error::BookError;
use crate::fixed_point::FixedPoint;
use mimalloc::MiMalloc;

/// Global allocator
/// Requires the `mimalloc` feature to be enabled in the `Cargo.toml` file.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// OrderID is the type used for order IDs, assigned monotonically per book.
pub type OrderID = u128;

/// Address is an opaque account identity supplied by the hosting runtime.
pub type Address = u64;

/// Side indicates the direction of the order.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug, Hash)]
pub enum Side {
    /// Buy means the user wants to acquire the instrument, matching against sell orders.
    #[default]
    Buy,
    /// Sell means the user wants to sell the instrument, matching against buy orders.
    Sell,
}

impl Side {
    /// The side this order matches against.
    #[inline(always)]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = BookError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Side::Buy),
            2 => Ok(Side::Sell),
            other => Err(BookError::InvalidType(other)),
        }
    }
}

/// OrderType determines how the order will be executed.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub enum OrderType {
    /// Limit orders specify a price and rest in the book when not immediately matched.
    #[default]
    Limit,
    /// Market orders carry no price and execute immediately against the best
    /// resting orders; any residual is cancelled by the engine.
    Market,
}

impl TryFrom<u8> for OrderType {
    type Error = BookError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(OrderType::Limit),
            2 => Ok(OrderType::Market),
            other => Err(BookError::InvalidType(other)),
        }
    }
}

/// OrderStatus represents the current status of an order during its lifecycle.
/// Every status other than `Pending` is terminal.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub enum OrderStatus {
    /// The order is active and can be matched.
    #[default]
    Pending,
    /// The order was cancelled before using up its quantity or collateral.
    Cancelled,
    /// The order stopped executing with quantity left but exhausted collateral.
    PartiallyFilled,
    /// The order's full quantity executed.
    Filled,
}

impl OrderStatus {
    #[inline(always)]
    pub fn is_terminal(self) -> bool {
        self != OrderStatus::Pending
    }
}

/// CancelAgent records who terminated an order.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub enum CancelAgent {
    /// Nobody: the order finalized by filling.
    #[default]
    None,
    /// The engine cancelled a market-order residual (immediate-or-cancel).
    Ioc,
    /// The owner cancelled explicitly.
    User,
}

/// OrderMetadata is the copyable view of an order carried in every event.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug)]
pub struct OrderMetadata {
    pub side: Side,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Limit price; zero for market orders, positive for limit orders.
    pub price: FixedPoint,
    pub original_qty: FixedPoint,
    /// Unexecuted quantity; `0 <= remaining_qty <= original_qty`.
    pub remaining_qty: FixedPoint,
}

/// `Order` owns an order's identity, metadata, and escrowed collateral.
///
/// Buy orders escrow quote units in `buy_collateral`; sell orders escrow
/// instrument units in `sell_collateral`. The other container stays empty for
/// the order's whole life.
#[derive(Debug)]
pub struct Order<I: CoinType, Q: CoinType> {
    pub id: OrderID,
    pub owner: Address,
    pub metadata: OrderMetadata,
    pub buy_collateral: Balance<Q>,
    pub sell_collateral: Balance<I>,
}

impl<I: CoinType, Q: CoinType> Order<I, Q> {
    /// Get the book key for the order.
    #[inline(always)]
    pub fn book_key(&self) -> BookKey {
        BookKey {
            price: self.metadata.price,
            id: self.id,
            side: self.metadata.side,
        }
    }

    #[inline(always)]
    pub fn remaining_qty(&self) -> FixedPoint {
        self.metadata.remaining_qty
    }

    /// Whether any collateral is still escrowed on either side.
    #[inline(always)]
    pub fn has_collateral(&self) -> bool {
        !self.buy_collateral.is_zero() || !self.sell_collateral.is_zero()
    }
}

/// BookKey is a composite key for identifying an order's position in the book.
/// It combines the order's price, its id (assignment order doubles as time
/// priority), and side (Buy/Sell).
///
/// The ordering semantics are:
/// - For Buy orders: higher prices are prioritized (sorted descending),
///   and for the same price, earlier orders (lower ids) are prioritized.
/// - For Sell orders: lower prices are prioritized (sorted ascending),
///   and for the same price, earlier orders (lower ids) are prioritized.
///
/// This allows a single skip map to sort all orders per side correctly,
/// without needing a secondary level of price grouping: the front of the map
/// is always the best order on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookKey {
    pub price: FixedPoint,
    pub id: OrderID,
    pub side: Side,
}

impl Ord for BookKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.side {
            Side::Buy => {
                // Higher price first for buys, then earlier id
                self.price
                    .cmp(&other.price)
                    .reverse()
                    .then(self.id.cmp(&other.id))
            }
            Side::Sell => {
                // Lower price first for sells, then earlier id
                self.price
                    .cmp(&other.price)
                    .then(self.id.cmp(&other.id))
            }
        }
    }
}

impl PartialOrd for BookKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
