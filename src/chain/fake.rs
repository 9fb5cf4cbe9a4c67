//! In-memory `TokenBridge` that records every call, for workflow tests

use super::{ChainInfo, TokenBridge, TxConfirmation};
use crate::error::ChainError;
use crate::tx::{MessagingFee, SendParam};

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Allowance,
    Approve { spender: Address, amount: U256 },
    IsPeer { eid: u32 },
    SetPeer { eid: u32, peer: [u8; 32] },
    QuoteSend,
    Send { value: U256, refund: Address },
    BalanceOf { account: Address },
}

#[derive(Default)]
struct State {
    allowance: U256,
    peers: HashSet<(u32, [u8; 32])>,
    balances: HashMap<Address, U256>,
    calls: Vec<Call>,
    next_tx: u64,
    native_fee: U256,
    fail_allowance: bool,
    fail_quote: bool,
    fail_send: bool,
    fail_balance: bool,
    revert_approve: bool,
    revert_set_peer: bool,
    revert_send: bool,
    reverted: HashSet<H256>,
    stall: HashSet<H256>,
    stall_all: bool,
}

pub struct FakeBridge {
    info: ChainInfo,
    state: Mutex<State>,
}

impl FakeBridge {
    pub fn new(network: &str, endpoint_id: u32, contract: u8, signer: u8) -> Self {
        let state = State {
            native_fee: U256::from(1_000_000_000_000_000u64),
            next_tx: u64::from(endpoint_id) << 32,
            ..State::default()
        };
        Self {
            info: ChainInfo {
                network: network.to_string(),
                endpoint_id,
                contract_address: Address::repeat_byte(contract),
                signer: Address::repeat_byte(signer),
            },
            state: Mutex::new(state),
        }
    }

    pub fn with_allowance(self, allowance: U256) -> Self {
        self.state.lock().unwrap().allowance = allowance;
        self
    }

    pub fn with_balance(self, account: Address, balance: U256) -> Self {
        self.state.lock().unwrap().balances.insert(account, balance);
        self
    }

    pub fn with_peer(self, eid: u32, peer: [u8; 32]) -> Self {
        self.state.lock().unwrap().peers.insert((eid, peer));
        self
    }

    pub fn failing_allowance(self) -> Self {
        self.state.lock().unwrap().fail_allowance = true;
        self
    }

    pub fn reverting_approve(self) -> Self {
        self.state.lock().unwrap().revert_approve = true;
        self
    }

    pub fn failing_send(self) -> Self {
        self.state.lock().unwrap().fail_send = true;
        self
    }

    pub fn reverting_send(self) -> Self {
        self.state.lock().unwrap().revert_send = true;
        self
    }

    pub fn failing_quote(self) -> Self {
        self.state.lock().unwrap().fail_quote = true;
        self
    }

    pub fn failing_balance(self) -> Self {
        self.state.lock().unwrap().fail_balance = true;
        self
    }

    pub fn reverting_set_peer(self) -> Self {
        self.state.lock().unwrap().revert_set_peer = true;
        self
    }

    /// No transaction submitted from now on ever confirms
    pub fn stall_confirmations(&self) {
        self.state.lock().unwrap().stall_all = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn allowance_now(&self) -> U256 {
        self.state.lock().unwrap().allowance
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn next_hash(state: &mut State) -> H256 {
        state.next_tx += 1;
        H256::from_low_u64_be(state.next_tx)
    }

    fn submitted(state: &mut State, reverts: bool) -> H256 {
        let hash = Self::next_hash(state);
        if state.stall_all {
            state.stall.insert(hash);
        }
        if reverts {
            state.reverted.insert(hash);
        }
        hash
    }
}

#[async_trait]
impl TokenBridge for FakeBridge {
    fn info(&self) -> &ChainInfo {
        &self.info
    }

    async fn allowance(&self, _owner: Address, _spender: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Allowance);
        if state.fail_allowance {
            return Err(ChainError::Rpc("connection refused".into()));
        }
        Ok(state.allowance)
    }

    async fn approve(&self, spender: Address, amount: U256) -> Result<H256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Approve { spender, amount });
        let reverts = state.revert_approve;
        if !reverts {
            state.allowance = amount;
        }
        Ok(Self::submitted(&mut state, reverts))
    }

    async fn is_peer(&self, eid: u32, peer: [u8; 32]) -> Result<bool, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::IsPeer { eid });
        Ok(state.peers.contains(&(eid, peer)))
    }

    async fn set_peer(&self, eid: u32, peer: [u8; 32]) -> Result<H256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::SetPeer { eid, peer });
        let reverts = state.revert_set_peer;
        if !reverts {
            state.peers.insert((eid, peer));
        }
        Ok(Self::submitted(&mut state, reverts))
    }

    async fn quote_send(&self, _param: &SendParam) -> Result<MessagingFee, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::QuoteSend);
        if state.fail_quote {
            return Err(ChainError::Contract("execution reverted: NoPeer".into()));
        }
        Ok(MessagingFee {
            native_fee: state.native_fee,
            lz_token_fee: U256::zero(),
        })
    }

    async fn send(
        &self,
        param: &SendParam,
        fee: &MessagingFee,
        refund: Address,
    ) -> Result<H256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Send {
            value: fee.native_fee,
            refund,
        });
        if state.fail_send {
            return Err(ChainError::Rpc("insufficient funds for gas * price + value".into()));
        }
        let reverts = state.revert_send;
        if !reverts {
            let signer = self.info.signer;
            let balance = state.balances.entry(signer).or_default();
            *balance = balance.saturating_sub(param.amount_ld);
        }
        Ok(Self::submitted(&mut state, reverts))
    }

    async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::BalanceOf { account });
        if state.fail_balance {
            return Err(ChainError::Rpc("connection reset".into()));
        }
        Ok(state.balances.get(&account).copied().unwrap_or_default())
    }

    async fn confirmation(
        &self,
        tx_hash: H256,
        _confirmations: u64,
    ) -> Result<Option<TxConfirmation>, ChainError> {
        let state = self.state.lock().unwrap();
        if state.stall.contains(&tx_hash) {
            return Ok(None);
        }
        if state.reverted.contains(&tx_hash) {
            return Err(ChainError::Reverted { tx_hash });
        }
        Ok(Some(TxConfirmation {
            tx_hash,
            block_number: 100,
            block_hash: Some(H256::repeat_byte(0xbb)),
            gas_used: Some(U256::from(21_000u64)),
        }))
    }
}
