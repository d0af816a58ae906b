use crate::coin::CoinError;
use crate::engine::types::OrderID;
use crate::fixed_point::FixedPointError;
use thiserror::Error;

/// Errors raised by market setup, order ingestion, and matching.
///
/// The variants that cross the host boundary carry the stable integer codes
/// exposed by [`BookError::code`]; arithmetic and coin failures wrap
/// transparently and abort the whole step without a code of their own.
#[derive(Debug, Error, PartialEq, Eq, Copy, Clone)]
pub enum BookError {
    /// The caller is not permitted to perform this operation.
    #[error("operation not allowed for caller")]
    NotAllowed,
    /// The caller is not the registry admin.
    #[error("caller is not the registry admin")]
    NotAdmin,
    /// A book for this market triple is already registered.
    #[error("a book for this market already exists")]
    BookExists,
    /// No book is registered for this market triple.
    #[error("no book registered for this market")]
    BookNotExists,
    /// A coin of the pair is not initialized with the runtime.
    #[error("coin is not initialized with the runtime")]
    CoinUninitialized,
    /// The order is not active in this book.
    #[error("order {0} is not active in this book")]
    UnknownOrder(OrderID),
    /// A limit price or order quantity failed validation.
    #[error("order price or quantity must be positive")]
    InvalidPrice,
    /// The caller does not own the order.
    #[error("caller does not own order {0}")]
    NotOwner(OrderID),
    /// A coin declares more decimal places than the engine supports.
    #[error("coin declares more than 10 decimal places")]
    CoinExceedsMaxDecimals,
    /// An unrecognized raw type tag from the hosting runtime.
    #[error("unrecognized type tag {0}")]
    InvalidType(u8),
    /// A crossed pair would execute zero quantity; matching cannot make
    /// progress.
    #[error("matching made no progress at a crossed price")]
    NoProgress,
    /// A queued market order is not pending; the sweep invariant is broken.
    #[error("market order {0} is not pending")]
    MarketOrderNotPending(OrderID),
    /// The market's declared decimals exceed what the coin pair supports.
    #[error("instrument and quote decimals exceed the coin pair's precision")]
    InvalidDecimalConfig,
    /// A fixed-point operation failed.
    #[error(transparent)]
    Arithmetic(#[from] FixedPointError),
    /// The coin runtime refused a balance operation.
    #[error(transparent)]
    Coin(#[from] CoinError),
}

impl BookError {
    /// The stable integer code for host-facing variants.
    pub fn code(&self) -> Option<u32> {
        match self {
            BookError::NotAllowed => Some(0),
            BookError::NotAdmin => Some(1),
            BookError::BookExists => Some(2),
            BookError::BookNotExists => Some(3),
            BookError::CoinUninitialized => Some(4),
            BookError::UnknownOrder(_) => Some(5),
            BookError::InvalidPrice => Some(6),
            BookError::NotOwner(_) => Some(7),
            BookError::CoinExceedsMaxDecimals => Some(8),
            BookError::InvalidType(_) => Some(9),
            BookError::NoProgress => Some(10),
            BookError::MarketOrderNotPending(_) => Some(11),
            BookError::InvalidDecimalConfig => Some(12),
            BookError::Arithmetic(_) | BookError::Coin(_) => None,
        }
    }
}
