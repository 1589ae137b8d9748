pub mod traits;
pub mod types;

pub mod indexer;
pub mod inscriber;
pub mod signer;
