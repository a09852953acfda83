use std::sync::Arc;

use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};

use crate::{
    addresses::pda::{get_user_account_pubkey, get_user_stats_account_pubkey},
    constants::drift_program,
    types::SdkResult,
};

/// The operator's signing wallet
#[derive(Clone)]
pub struct Wallet {
    signer: Arc<Keypair>,
    authority: Pubkey,
}

impl Wallet {
    pub fn new(keypair: Keypair) -> Self {
        let authority = keypair.pubkey();
        Self {
            signer: Arc::new(keypair),
            authority,
        }
    }

    pub fn authority(&self) -> &Pubkey {
        &self.authority
    }

    pub fn signer(&self) -> &Keypair {
        &self.signer
    }

    /// The wallet's drift user account for `sub_account_id`
    pub fn sub_account(&self, sub_account_id: u16) -> Pubkey {
        get_user_account_pubkey(&drift_program(), self.authority, Some(sub_account_id))
    }

    pub fn default_sub_account(&self) -> Pubkey {
        self.sub_account(0)
    }

    /// The wallet's drift user stats account
    pub fn stats_account(&self) -> Pubkey {
        get_user_stats_account_pubkey(&drift_program(), self.authority)
    }

    pub fn sign_tx(&self, ixs: &[Instruction], recent_blockhash: Hash) -> SdkResult<Transaction> {
        let mut tx = Transaction::new_with_payer(ixs, Some(&self.authority));
        tx.try_sign(&[self.signer.as_ref()], recent_blockhash)?;
        Ok(tx)
    }
}
