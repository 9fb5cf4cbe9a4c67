//! Transfer payload construction: amounts, executor options and OFT call parameters

mod amount;
mod options;
mod params;

pub use amount::TokenAmount;
pub use options::{pad_address, ExecutorOptions};
pub use params::{MessagingFee, SendParam};
