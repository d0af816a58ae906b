use crate::coin::{CoinRuntime, CoinType};
use crate::engine::book::OrderBook;
use crate::engine::error::BookError;
use crate::engine::types::Address;
use std::any::TypeId;
use std::collections::HashMap;
use tracing::debug;

/// Most decimal places a coin may declare and still trade here.
pub const MAX_COIN_DECIMALS: u8 = 10;

/// BookType tags the flavor of book registered for a pair. `Hybrid` exists
/// only as a tag; this engine evaluates no curve.
#[derive(PartialEq, Eq, Default, Copy, Clone, Debug, Hash)]
pub enum BookType {
    #[default]
    Clob,
    Hybrid,
}

impl TryFrom<u8> for BookType {
    type Error = BookError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(BookType::Clob),
            2 => Ok(BookType::Hybrid),
            other => Err(BookError::InvalidType(other)),
        }
    }
}

/// Identifies one market: the coin pair plus the book flavor.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
struct MarketKey {
    instrument: TypeId,
    quote: TypeId,
    book_type: BookType,
}

impl MarketKey {
    fn of<I: CoinType, Q: CoinType>(book_type: BookType) -> Self {
        MarketKey {
            instrument: TypeId::of::<I>(),
            quote: TypeId::of::<Q>(),
            book_type,
        }
    }
}

/// CustodianCapability vouches that `protocol` may act for `user` on a
/// market. It is an opaque value: only
/// [`MarketRegistry::issue_custodian_capability`] mints one, after checking
/// the caller's identity, and it carries the pair as data only.
#[derive(Debug)]
pub struct CustodianCapability {
    protocol: Address,
    user: Address,
}

impl CustodianCapability {
    pub fn protocol(&self) -> Address {
        self.protocol
    }

    pub fn user(&self) -> Address {
        self.user
    }
}

/// MarketRegistry resolves `(instrument, quote, book type)` to the address a
/// book lives at. Registration happens through [`init_market`]; removal is
/// admin-gated.
pub struct MarketRegistry {
    admin: Address,
    markets: HashMap<MarketKey, Address>,
}

impl MarketRegistry {
    pub fn new(admin: Address) -> Self {
        MarketRegistry {
            admin,
            markets: HashMap::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Record a new market. Fails with `BookExists` when the triple is
    /// already taken.
    pub fn register<I: CoinType, Q: CoinType>(
        &mut self,
        book_type: BookType,
        address: Address,
    ) -> Result<(), BookError> {
        let key = MarketKey::of::<I, Q>(book_type);
        if self.markets.contains_key(&key) {
            return Err(BookError::BookExists);
        }
        self.markets.insert(key, address);
        debug!(?book_type, address, "market registered");
        Ok(())
    }

    /// The address of the book registered for the triple.
    pub fn resolve<I: CoinType, Q: CoinType>(
        &self,
        book_type: BookType,
    ) -> Result<Address, BookError> {
        self.markets
            .get(&MarketKey::of::<I, Q>(book_type))
            .copied()
            .ok_or(BookError::BookNotExists)
    }

    pub fn has_market<I: CoinType, Q: CoinType>(&self, book_type: BookType) -> bool {
        self.markets.contains_key(&MarketKey::of::<I, Q>(book_type))
    }

    /// Drop a market from the registry. Admin only.
    pub fn remove_market<I: CoinType, Q: CoinType>(
        &mut self,
        caller: Address,
        book_type: BookType,
    ) -> Result<Address, BookError> {
        if caller != self.admin {
            return Err(BookError::NotAdmin);
        }
        self.markets
            .remove(&MarketKey::of::<I, Q>(book_type))
            .ok_or(BookError::BookNotExists)
    }

    /// Mint a capability letting `protocol` act for `user`. The caller must
    /// be the protocol address it claims.
    pub fn issue_custodian_capability(
        &self,
        caller: Address,
        protocol: Address,
        user: Address,
    ) -> Result<CustodianCapability, BookError> {
        if caller != protocol {
            return Err(BookError::NotAllowed);
        }
        Ok(CustodianCapability { protocol, user })
    }
}

/// Create the book for the pair `(I, Q)` at `owner` and register it.
///
/// The market's declared precisions must fit the coin pair: each bounded by
/// its coin's decimals, and their sum bounded by the smaller coin, so any
/// `price * qty` product stays exactly representable in both coins.
pub fn init_market<I, Q, R>(
    registry: &mut MarketRegistry,
    runtime: &R,
    owner: Address,
    i_decimals: u8,
    q_decimals: u8,
) -> Result<OrderBook<I, Q>, BookError>
where
    I: CoinType,
    Q: CoinType,
    R: CoinRuntime<I> + CoinRuntime<Q>,
{
    let i_coin_decimals =
        CoinRuntime::<I>::decimals(runtime).ok_or(BookError::CoinUninitialized)?;
    let q_coin_decimals =
        CoinRuntime::<Q>::decimals(runtime).ok_or(BookError::CoinUninitialized)?;
    if i_coin_decimals > MAX_COIN_DECIMALS || q_coin_decimals > MAX_COIN_DECIMALS {
        return Err(BookError::CoinExceedsMaxDecimals);
    }

    let coin_floor = i_coin_decimals.min(q_coin_decimals);
    if i_decimals > i_coin_decimals
        || q_decimals > q_coin_decimals
        || i_decimals as u16 + q_decimals as u16 > coin_floor as u16
    {
        return Err(BookError::InvalidDecimalConfig);
    }

    registry.register::<I, Q>(BookType::Clob, owner)?;
    Ok(OrderBook::new(
        owner,
        i_decimals,
        q_decimals,
        i_coin_decimals,
        q_coin_decimals,
    ))
}
