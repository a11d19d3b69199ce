//! Account workflows.

use common::AccountId;
use domain::{Account, normalize_email};
use store::AccountStore;

use crate::commands::CreateAccount;
use crate::error::{NotFoundExt, Result, ServiceError, record_rejection};

/// Service for opening and reading accounts.
pub struct AccountService<A: AccountStore> {
    accounts: A,
}

impl<A: AccountStore> AccountService<A> {
    /// Creates a new account service over the given store.
    pub fn new(accounts: A) -> Self {
        Self { accounts }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &A {
        &self.accounts
    }

    /// Opens a new account and returns the identifier the store assigned.
    ///
    /// Emails are compared case-insensitively. Fails with
    /// `EmailAlreadyExists` when the email is taken and with
    /// `InvalidEmail` when the account rules reject it. A single insert is
    /// the only write, so no unit of work is opened.
    #[tracing::instrument(skip(self))]
    pub async fn create_account(&self, cmd: CreateAccount) -> Result<AccountId> {
        self.run_create_account(cmd)
            .await
            .inspect(|account_id| {
                metrics::counter!("accounts_created_total").increment(1);
                tracing::info!(%account_id, "account created");
            })
            .inspect_err(|err| record_rejection("create_account", err))
    }

    async fn run_create_account(&self, cmd: CreateAccount) -> Result<AccountId> {
        let email = normalize_email(&cmd.email);
        match self.accounts.find_account_by_email(&email).await {
            Ok(existing) => {
                return Err(match existing.id() {
                    Some(existing) => ServiceError::EmailAlreadyExists {
                        email: cmd.email,
                        existing,
                    },
                    // A stored account always carries its id.
                    None => ServiceError::Store(store::StoreError::MissingId { entity: "account" }),
                });
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let account = Account::create(cmd.name, cmd.email).map_err(ServiceError::InvalidEmail)?;
        let account_id = self.accounts.save_account(&account).await?;
        Ok(account_id)
    }

    /// Loads an account by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.accounts
            .find_account(account_id)
            .await
            .or_not_found(|| ServiceError::AccountNotFound(account_id))
    }
}
