//! Tests for batch transaction assembly

mod common;

use common::FakeLedger;
use reward_topup::error::FundingError;
use reward_topup::funding::instruction::{anchor_discriminator, token_account};
use reward_topup::funding::{BatchTransferItem, ComputeBudget, ProgramIds, TokenProgram, TransferOrchestrator};
use solana_sdk::{
    compute_budget,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};

fn item(mint: Pubkey, amount: u128) -> BatchTransferItem {
    BatchTransferItem {
        mint,
        recipient: Pubkey::new_unique(),
        vault: Pubkey::new_unique(),
        amount,
        fee_value: None,
        token_program: TokenProgram::Standard,
    }
}

/// Program id of every instruction, in order.
fn program_order(tx: &solana_sdk::transaction::Transaction) -> Vec<Pubkey> {
    tx.message
        .instructions
        .iter()
        .map(|ix| tx.message.account_keys[ix.program_id_index as usize])
        .collect()
}

#[tokio::test]
async fn test_empty_batch_is_nothing_to_do() {
    let ledger = FakeLedger::new();
    let orchestrator = TransferOrchestrator::new(ledger.clone(), ProgramIds::default());

    let prepared = orchestrator
        .prepare_batch(&Keypair::new(), Vec::new(), ComputeBudget::for_transfers(0))
        .await
        .unwrap();

    assert!(prepared.is_none());
    assert_eq!(ledger.blockhash_calls(), 0);
}

#[tokio::test]
async fn test_instruction_order_with_missing_accounts() {
    let ledger = FakeLedger::new();
    let programs = ProgramIds::default();
    let orchestrator = TransferOrchestrator::new(ledger.clone(), programs);
    let funder = Keypair::new();
    let mint = Pubkey::new_unique();

    let prepared = orchestrator
        .prepare_batch(
            &funder,
            vec![item(mint, 100), item(mint, 200)],
            ComputeBudget::for_transfers(2),
        )
        .await
        .unwrap()
        .unwrap();

    let ata_program = spl_associated_token_account::id();
    assert_eq!(
        program_order(&prepared.transaction),
        vec![
            compute_budget::id(),
            compute_budget::id(),
            ata_program,
            ata_program,
            programs.reward_pool,
            programs.reward_pool,
        ]
    );
    assert_eq!(prepared.transaction.message.account_keys[0], funder.pubkey());
    assert_eq!(prepared.items.len(), 2);
    assert_eq!(prepared.total_amount(), 300);
    assert!(prepared.transaction.is_signed());
    assert_eq!(ledger.blockhash_calls(), 1);
}

#[tokio::test]
async fn test_existing_accounts_are_not_recreated() {
    let ledger = FakeLedger::new();
    let programs = ProgramIds::default();
    let orchestrator = TransferOrchestrator::new(ledger.clone(), programs);
    let funder = Keypair::new();
    let mint = Pubkey::new_unique();
    ledger.add_account(token_account(&funder.pubkey(), &mint, TokenProgram::Standard));
    ledger.add_account(token_account(&programs.treasury, &mint, TokenProgram::Standard));

    let prepared = orchestrator
        .prepare_batch(&funder, vec![item(mint, 100)], ComputeBudget::for_transfers(1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        program_order(&prepared.transaction),
        vec![compute_budget::id(), compute_budget::id(), programs.reward_pool]
    );
}

#[tokio::test]
async fn test_distinct_mints_get_their_own_accounts() {
    let ledger = FakeLedger::new();
    let programs = ProgramIds::default();
    let orchestrator = TransferOrchestrator::new(ledger.clone(), programs);
    let funder = Keypair::new();
    let (mint_a, mint_b) = (Pubkey::new_unique(), Pubkey::new_unique());
    ledger.add_account(token_account(&funder.pubkey(), &mint_a, TokenProgram::Standard));

    let prepared = orchestrator
        .prepare_batch(
            &funder,
            vec![item(mint_a, 1), item(mint_b, 2), item(mint_a, 3)],
            ComputeBudget::for_transfers(3),
        )
        .await
        .unwrap()
        .unwrap();

    let ata_program = spl_associated_token_account::id();
    let creations = program_order(&prepared.transaction)
        .iter()
        .filter(|program| **program == ata_program)
        .count();
    // treasury for mint_a, funder and treasury for mint_b
    assert_eq!(creations, 3);
}

#[tokio::test]
async fn test_fund_pool_payload_follows_item_order() {
    let ledger = FakeLedger::new();
    let programs = ProgramIds::default();
    let orchestrator = TransferOrchestrator::new(ledger.clone(), programs);
    let funder = Keypair::new();
    let items = vec![item(Pubkey::new_unique(), 11), item(Pubkey::new_unique(), 22)];

    let prepared = orchestrator
        .prepare_batch(&funder, items.clone(), ComputeBudget::for_transfers(2))
        .await
        .unwrap()
        .unwrap();

    let message = &prepared.transaction.message;
    let transfers: Vec<_> = message
        .instructions
        .iter()
        .filter(|ix| message.account_keys[ix.program_id_index as usize] == programs.reward_pool)
        .collect();
    assert_eq!(transfers.len(), 2);

    for (ix, item) in transfers.iter().zip(&items) {
        assert_eq!(&ix.data[..8], &anchor_discriminator("global", "fund_pool"));
        assert_eq!(ix.data[8..], (item.amount as u64).to_le_bytes());
        assert_eq!(message.account_keys[ix.accounts[3] as usize], item.recipient);
        assert_eq!(message.account_keys[ix.accounts[2] as usize], item.vault);
    }
}

#[tokio::test]
async fn test_amount_beyond_u64_fails() {
    let ledger = FakeLedger::new();
    let orchestrator = TransferOrchestrator::new(ledger.clone(), ProgramIds::default());

    let err = orchestrator
        .prepare_batch(
            &Keypair::new(),
            vec![item(Pubkey::new_unique(), u128::from(u64::MAX) + 1)],
            ComputeBudget::for_transfers(1),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FundingError::AmountTooLarge(_)));
    assert_eq!(ledger.blockhash_calls(), 0);
}
