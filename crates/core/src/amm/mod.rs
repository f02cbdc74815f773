//! Constant-product pricing and swap routing.

pub mod math;
mod router;

pub use math::{get_amount_in, get_amount_out, FeeRate};
pub use router::{SwapQuote, SwapRouter};
