//! Conflux domain types exchanged with the node.

mod chain;
mod epoch;
pub mod quantity;
mod transaction;

pub use chain::{BlockSummary, EpochNotification, Estimate, Log, LogFilter, Status};
pub use epoch::Epoch;
pub use transaction::{
    CallRequest, SignedTransaction, Transaction, TransactionReceipt, UnsignedTransaction,
};
