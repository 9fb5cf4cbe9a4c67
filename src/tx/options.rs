//! LayerZero V2 executor options (type 3) and bytes32 address padding

use ethers::types::{Address, Bytes};

const TYPE_3: u16 = 3;
const EXECUTOR_WORKER_ID: u8 = 1;
const OPTION_TYPE_LZRECEIVE: u8 = 1;

/// Builder for the type-3 options blob passed as `extraOptions`
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    options: Vec<Vec<u8>>,
}

impl ExecutorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gas (and optional native value) the executor forwards to `lzReceive`
    pub fn lz_receive(mut self, gas: u128, value: u128) -> Self {
        let mut payload = gas.to_be_bytes().to_vec();
        if value != 0 {
            payload.extend_from_slice(&value.to_be_bytes());
        }

        let mut option = Vec::with_capacity(payload.len() + 4);
        option.push(EXECUTOR_WORKER_ID);
        // length covers the option type byte plus the payload
        option.extend_from_slice(&((payload.len() + 1) as u16).to_be_bytes());
        option.push(OPTION_TYPE_LZRECEIVE);
        option.extend_from_slice(&payload);

        self.options.push(option);
        self
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = TYPE_3.to_be_bytes().to_vec();
        for option in &self.options {
            out.extend_from_slice(option);
        }
        Bytes::from(out)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Left-pad a 20-byte address to the 32-byte peer/recipient width
pub fn pad_address(address: Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_bytes());
    out
}
