//! EIP-712 payload of signed withdrawals and ECDSA recovery.

use alloy::{
    primitives::{Address, Signature, B256, U256},
    sol,
    sol_types::{Eip712Domain, SolStruct},
};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct WithdrawAccountSharePeriodTo {
        address client;
        uint256 balanceShareId;
        address account;
        address receiver;
        address[] assets;
        uint256 periodIndex;
        uint256 nonce;
        uint256 deadline;
    }
}

/// Everything an account signs to let someone else settle a period on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalPermit {
    pub client: Address,
    pub balance_share_id: U256,
    pub account: Address,
    pub receiver: Address,
    pub assets: Vec<Address>,
    pub period_index: u64,
    pub nonce: U256,
    pub deadline: u64,
}

impl WithdrawalPermit {
    pub fn signing_hash(&self, domain: &Eip712Domain) -> B256 {
        WithdrawAccountSharePeriodTo {
            client: self.client,
            balanceShareId: self.balance_share_id,
            account: self.account,
            receiver: self.receiver,
            assets: self.assets.clone(),
            periodIndex: U256::from(self.period_index),
            nonce: self.nonce,
            deadline: U256::from(self.deadline),
        }
        .eip712_signing_hash(domain)
    }
}

/// Signer of a 65-byte `r || s || v` signature over `hash`.
pub fn recover_signer(hash: &B256, signature: &[u8]) -> Option<Address> {
    let signature = Signature::try_from(signature).ok()?;
    signature
        .recover_address_from_prehash(hash)
        .ok()
        .filter(|signer| !signer.is_zero())
}
