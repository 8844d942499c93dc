pub use self::chain::{Chain, ChainReader};

mod chain;
