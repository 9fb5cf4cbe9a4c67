//! OFT `send` / `quoteSend` call parameters

use super::options::pad_address;
use super::TokenAmount;

use ethers::types::{Address, Bytes, U256};
use serde::Serialize;

/// ABI tuple layout of `SendParam`
pub type SendParamTuple = (u32, [u8; 32], U256, U256, Bytes, Bytes, Bytes);

/// Mirror of the OFT `SendParam` struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendParam {
    pub dst_eid: u32,
    pub to: [u8; 32],
    pub amount_ld: U256,
    pub min_amount_ld: U256,
    pub extra_options: Bytes,
    pub compose_msg: Bytes,
    pub oft_cmd: Bytes,
}

impl SendParam {
    /// Plain transfer: no slippage allowance, no compose message
    pub fn transfer(
        dst_eid: u32,
        recipient: Address,
        amount: &TokenAmount,
        extra_options: Bytes,
    ) -> Self {
        Self {
            dst_eid,
            to: pad_address(recipient),
            amount_ld: amount.base_units(),
            min_amount_ld: amount.base_units(),
            extra_options,
            compose_msg: Bytes::new(),
            oft_cmd: Bytes::new(),
        }
    }

    pub fn as_tuple(&self) -> SendParamTuple {
        (
            self.dst_eid,
            self.to,
            self.amount_ld,
            self.min_amount_ld,
            self.extra_options.clone(),
            self.compose_msg.clone(),
            self.oft_cmd.clone(),
        )
    }
}

/// Mirror of the OFT `MessagingFee` struct
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MessagingFee {
    pub native_fee: U256,
    pub lz_token_fee: U256,
}

impl MessagingFee {
    pub fn as_tuple(&self) -> (U256, U256) {
        (self.native_fee, self.lz_token_fee)
    }
}

impl From<(U256, U256)> for MessagingFee {
    fn from((native_fee, lz_token_fee): (U256, U256)) -> Self {
        Self {
            native_fee,
            lz_token_fee,
        }
    }
}
