//! Assembles a signed batch transaction out of transfer items.

use std::collections::HashSet;
use std::sync::Arc;

use nonempty::NonEmpty;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::Transaction,
};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::funding::gateway::LedgerGateway;
use crate::funding::instruction::{create_token_account, fund_pool, token_account};
use crate::funding::types::{BatchTransferItem, ComputeBudget, PreparedTransaction, ProgramIds, TokenProgram};

pub struct TransferOrchestrator {
    gateway: Arc<dyn LedgerGateway>,
    programs: ProgramIds,
}

impl TransferOrchestrator {
    pub fn new(gateway: Arc<dyn LedgerGateway>, programs: ProgramIds) -> Self {
        Self { gateway, programs }
    }

    /// Builds one transaction funding every item, signed by `funder`.
    ///
    /// Instruction order: compute budget (limit, price), missing token
    /// accounts of the funder and treasury per mint, then one `fund_pool`
    /// per item in input order. Returns `None` for an empty batch.
    #[instrument(skip(self, funder, items, budget), fields(funder = %funder.pubkey(), transfers = items.len()))]
    pub async fn prepare_batch(
        &self,
        funder: &Keypair,
        items: Vec<BatchTransferItem>,
        budget: ComputeBudget,
    ) -> Result<Option<PreparedTransaction>> {
        let Some(items) = NonEmpty::from_vec(items) else {
            warn!("No transfers provided for batch operation");
            return Ok(None);
        };

        let payer = funder.pubkey();
        let mut instructions = budget.instructions();
        instructions.extend(self.token_account_setup(&payer, &items).await?);
        for item in items.iter() {
            instructions.push(fund_pool(&self.programs, &payer, item)?);
        }

        let (blockhash, last_valid_block_height) = self.gateway.latest_blockhash().await?;
        let transaction =
            Transaction::new_signed_with_payer(&instructions, Some(&payer), &[funder], blockhash);

        let prepared = PreparedTransaction {
            transaction,
            blockhash,
            last_valid_block_height,
            items,
        };
        info!(
            "Prepared batch {} with {} instructions: {}",
            prepared.signature(),
            instructions.len(),
            prepared.summary()
        );
        Ok(Some(prepared))
    }

    /// Idempotent creations for the token accounts `fund_pool` debits and
    /// credits, emitted once per (mint, token program) and only when the
    /// account is missing.
    async fn token_account_setup(
        &self,
        payer: &Pubkey,
        items: &NonEmpty<BatchTransferItem>,
    ) -> Result<Vec<Instruction>> {
        let mut seen: HashSet<(Pubkey, TokenProgram)> = HashSet::new();
        let mut instructions = Vec::new();

        for item in items.iter() {
            if !seen.insert((item.mint, item.token_program)) {
                continue;
            }
            for owner in [*payer, self.programs.treasury] {
                let address = token_account(&owner, &item.mint, item.token_program);
                if self.gateway.account_exists(&address).await? {
                    continue;
                }
                debug!("Token account {} for {} is missing, creating it", address, owner);
                instructions.push(create_token_account(payer, &owner, &item.mint, item.token_program));
            }
        }

        Ok(instructions)
    }
}
