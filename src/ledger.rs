//! The slice of the Solana RPC surface the voting client needs.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::errors::VoteError;

/// Push notifications for accounts owned by a program. Dropping it tears
/// the underlying subscription down.
pub struct ProgramSubscription {
    pub events: mpsc::UnboundedReceiver<Pubkey>,
    _cancel: oneshot::Sender<()>,
}

impl ProgramSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<Pubkey>, cancel: oneshot::Sender<()>) -> Self {
        Self {
            events,
            _cancel: cancel,
        }
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, VoteError>;

    /// Accounts owned by `program` whose data starts with `discriminator`.
    async fn get_program_accounts(
        &self,
        program: &Pubkey,
        discriminator: &[u8],
    ) -> Result<Vec<(Pubkey, Account)>, VoteError>;

    /// Sign, submit and wait for confirmation. Failures carry the raw ledger
    /// message in `VoteError::Rpc`.
    async fn send_instruction(&self, instruction: Instruction, payer: &Keypair) -> Result<Signature, VoteError>;

    async fn subscribe_program(&self, program: &Pubkey, discriminator: &[u8]) -> Result<ProgramSubscription, VoteError>;
}

#[async_trait]
impl<L: Ledger + ?Sized> Ledger for Arc<L> {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, VoteError> {
        (**self).get_account(address).await
    }

    async fn get_program_accounts(
        &self,
        program: &Pubkey,
        discriminator: &[u8],
    ) -> Result<Vec<(Pubkey, Account)>, VoteError> {
        (**self).get_program_accounts(program, discriminator).await
    }

    async fn send_instruction(&self, instruction: Instruction, payer: &Keypair) -> Result<Signature, VoteError> {
        (**self).send_instruction(instruction, payer).await
    }

    async fn subscribe_program(&self, program: &Pubkey, discriminator: &[u8]) -> Result<ProgramSubscription, VoteError> {
        (**self).subscribe_program(program, discriminator).await
    }
}

/// [`Ledger`] over a Solana JSON-RPC endpoint and its websocket.
pub struct RpcLedger {
    rpc: RpcClient,
    ws_url: String,
    commitment: CommitmentConfig,
}

impl RpcLedger {
    pub fn new(rpc_url: &str, ws_url: &str) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            rpc: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            ws_url: ws_url.to_string(),
            commitment,
        }
    }

    fn filter_config(&self, discriminator: &[u8]) -> RpcProgramAccountsConfig {
        RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                0,
                discriminator.to_vec(),
            ))]),
            account_config: RpcAccountInfoConfig {
                commitment: Some(self.commitment),
                ..RpcAccountInfoConfig::default()
            },
            ..RpcProgramAccountsConfig::default()
        }
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, VoteError> {
        self.rpc
            .get_account_with_commitment(address, self.commitment)
            .await
            .map(|response| response.value)
            .map_err(|e| VoteError::Rpc(e.to_string()))
    }

    async fn get_program_accounts(
        &self,
        program: &Pubkey,
        discriminator: &[u8],
    ) -> Result<Vec<(Pubkey, Account)>, VoteError> {
        let accounts = self
            .rpc
            .get_program_accounts_with_config(program, self.filter_config(discriminator))
            .await
            .map_err(|e| VoteError::Rpc(e.to_string()))?;
        debug!(%program, count = accounts.len(), "fetched program accounts");
        Ok(accounts)
    }

    async fn send_instruction(&self, instruction: Instruction, payer: &Keypair) -> Result<Signature, VoteError> {
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| VoteError::Rpc(e.to_string()))?;
        let tx = Transaction::new_signed_with_payer(&[instruction], Some(&payer.pubkey()), &[payer], blockhash);
        self.rpc
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(|e| VoteError::Rpc(e.to_string()))
    }

    async fn subscribe_program(&self, program: &Pubkey, discriminator: &[u8]) -> Result<ProgramSubscription, VoteError> {
        let client = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| VoteError::Rpc(format!("websocket unavailable: {}", e)))?;
        let config = self.filter_config(discriminator);
        let program = *program;
        let (tx, rx) = mpsc::unbounded_channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let (mut stream, unsubscribe) = match client.program_subscribe(&program, Some(config)).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(%program, error = %e, "program subscription failed");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => break,
                    update = stream.next() => match update {
                        Some(response) => {
                            let Ok(key) = Pubkey::from_str(&response.value.pubkey) else {
                                continue;
                            };
                            if tx.send(key).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            drop(stream);
            unsubscribe().await;
            debug!(%program, "program subscription closed");
        });

        Ok(ProgramSubscription::new(rx, cancel_tx))
    }
}
