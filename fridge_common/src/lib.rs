mod brl;
mod helpers;

pub mod op;
mod secret;

pub use brl::{Brl, BrlParseError, BRL_CURRENCY_CODE};
pub use helpers::parse_boolean_flag;
pub use secret::Secret;
