pub mod parser;

pub use parser::{EtchingParser, ParsedEtching};
