// Library root: the contest normalization and correlation engine.
//
// Everything here is a pure transformation over data that has already been
// scraped or loaded. File layout, SQLite and the batch driver live in
// `ledger-app`.

pub mod columns;
pub mod contest;
pub mod entrant;
pub mod entry_name;
pub mod error;
pub mod lineup;
pub mod merge;
pub mod payout;
pub mod results;
pub mod salary;

pub use contest::{Contest, ContestId, ContestListing};
pub use error::{LedgerError, Result};
