//! Ordered store mutations committed through one unit of work.

use std::time::Instant;

use common::OrderId;
use domain::{Account, Order};
use store::{RowsAffected, StoreError, Transaction, UnitOfWork};

use crate::error::{Result, ServiceError};

/// A single write inside an [`AtomicPlan`].
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Conditional write of the account's consumption total.
    UpdateConsumptionTotal(Account),
    /// Insert of a new order.
    SaveOrder(Order),
    /// Conditional write of an order's validity flag.
    UpdateValidity { order_id: OrderId, is_valid: bool },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::UpdateConsumptionTotal(_) => "update_consumption_total",
            Mutation::SaveOrder(_) => "save_order",
            Mutation::UpdateValidity { .. } => "update_validity",
        }
    }
}

/// A mutation paired with the row count it must affect, if any.
///
/// Conditional updates carry an expected count; inserts either return an
/// identifier or fail.
#[derive(Debug, Clone)]
pub struct Step {
    mutation: Mutation,
    expected_rows: Option<RowsAffected>,
}

impl Step {
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    pub fn expected_rows(&self) -> Option<RowsAffected> {
        self.expected_rows
    }

    fn check_rows(
        &self,
        rows_affected: RowsAffected,
        mismatch: impl FnOnce(RowsAffected, RowsAffected) -> ServiceError,
    ) -> Result<()> {
        match self.expected_rows {
            Some(expected) if expected != rows_affected => Err(mismatch(expected, rows_affected)),
            _ => Ok(()),
        }
    }
}

/// What a committed plan produced.
#[derive(Debug, Default)]
pub struct PlanOutcome {
    /// Identifiers of inserted orders, in step order.
    pub saved_orders: Vec<OrderId>,
}

/// An ordered list of mutations applied all-or-nothing.
///
/// Steps run in the order they were added. The first failing step, or the
/// first step whose effect differs from its expectation, stops the plan; the
/// transaction is rolled back and that error is returned.
#[derive(Debug, Default)]
pub struct AtomicPlan {
    steps: Vec<Step>,
}

impl AtomicPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a consumption total write that must touch exactly one row.
    /// The account must carry its stored identifier.
    pub fn update_consumption_total(mut self, account: Account) -> Self {
        self.steps.push(Step {
            mutation: Mutation::UpdateConsumptionTotal(account),
            expected_rows: Some(1),
        });
        self
    }

    /// Adds an order insert.
    pub fn save_order(mut self, order: Order) -> Self {
        self.steps.push(Step {
            mutation: Mutation::SaveOrder(order),
            expected_rows: None,
        });
        self
    }

    /// Adds a validity write that must touch exactly one row.
    pub fn update_validity(mut self, order_id: OrderId, is_valid: bool) -> Self {
        self.steps.push(Step {
            mutation: Mutation::UpdateValidity { order_id, is_valid },
            expected_rows: Some(1),
        });
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs every step inside one transaction.
    pub async fn execute<U>(self, uow: &U) -> Result<PlanOutcome>
    where
        U: UnitOfWork + ?Sized,
    {
        let started = Instant::now();
        let mut tx = uow.begin().await?;
        let mut outcome = PlanOutcome::default();

        for (index, step) in self.steps.iter().enumerate() {
            if let Err(err) = apply(tx.as_mut(), step, &mut outcome).await {
                tracing::warn!(
                    step = index,
                    mutation = step.mutation.name(),
                    error = %err,
                    "step failed, rolling back"
                );
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
            tracing::debug!(step = index, mutation = step.mutation.name(), "step applied");
        }

        tx.commit().await?;
        metrics::histogram!("unit_of_work_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(outcome)
    }
}

async fn apply(tx: &mut dyn Transaction, step: &Step, outcome: &mut PlanOutcome) -> Result<()> {
    match &step.mutation {
        Mutation::UpdateConsumptionTotal(account) => {
            let account_id = account
                .id()
                .ok_or(StoreError::MissingId { entity: "account" })?;
            let rows = tx.update_consumption_total(account).await?;
            step.check_rows(rows, |expected, rows_affected| {
                ServiceError::AccountUpdateMismatch {
                    account_id,
                    expected,
                    rows_affected,
                }
            })
        }
        Mutation::SaveOrder(order) => {
            let order_id = tx.save_order(order).await?;
            outcome.saved_orders.push(order_id);
            Ok(())
        }
        Mutation::UpdateValidity { order_id, is_valid } => {
            let rows = tx.update_validity(*order_id, *is_valid).await?;
            step.check_rows(rows, |expected, rows_affected| {
                ServiceError::OrderUpdateMismatch {
                    order_id: *order_id,
                    expected,
                    rows_affected,
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Money;
    use common::AccountId;
    use store::{AccountStore, Fault, InMemoryStore, OrderStore, StoreOperation};

    async fn seeded(store: &InMemoryStore, total: i64) -> (AccountId, Account) {
        let mut account = Account::create("test", "test@example.com").unwrap();
        account.add_consumption(Money::from_cents(total)).unwrap();
        let id = store.save_account(&account).await.unwrap();
        (id, store.find_account(id).await.unwrap())
    }

    #[tokio::test]
    async fn test_plan_commits_all_steps() {
        let store = InMemoryStore::new();
        let (id, mut account) = seeded(&store, 200).await;
        account.add_consumption(Money::from_cents(500)).unwrap();
        let order = Account::create_order(id, Money::from_cents(500)).unwrap();

        let outcome = AtomicPlan::new()
            .update_consumption_total(account)
            .save_order(order)
            .execute(&store)
            .await
            .unwrap();

        assert_eq!(outcome.saved_orders.len(), 1);
        assert_eq!(
            store.find_account(id).await.unwrap().consumption_total().cents(),
            700
        );
        assert!(store.find_order(outcome.saved_orders[0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_mismatch_stops_plan_and_rolls_back() {
        let store = InMemoryStore::new();
        let (id, account) = seeded(&store, 0).await;
        let order = Account::create_order(id, Money::from_cents(1)).unwrap();
        store
            .inject_fault(StoreOperation::UpdateConsumptionTotal, Fault::RowsAffected(2))
            .await;
        store.clear_operations().await;

        let err = AtomicPlan::new()
            .update_consumption_total(account)
            .save_order(order)
            .execute(&store)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::AccountUpdateMismatch {
                rows_affected: 2,
                expected: 1,
                ..
            }
        ));
        assert_eq!(
            store.operations().await,
            vec![
                StoreOperation::Begin,
                StoreOperation::UpdateConsumptionTotal,
                StoreOperation::Rollback
            ]
        );
    }

    #[tokio::test]
    async fn test_first_error_wins_over_rollback_failure() {
        let store = InMemoryStore::new();
        let (id, account) = seeded(&store, 0).await;
        store
            .inject_fault(StoreOperation::SaveOrder, Fault::Fail("disk full".to_string()))
            .await;
        store
            .inject_fault(StoreOperation::Rollback, Fault::Fail("gone".to_string()))
            .await;
        let order = Account::create_order(id, Money::zero()).unwrap();

        let err = AtomicPlan::new()
            .update_consumption_total(account)
            .save_order(order)
            .execute(&store)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Store(StoreError::Backend(ref m)) if m == "disk full"));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_commit_failure_discards_writes() {
        let store = InMemoryStore::new();
        let (id, mut account) = seeded(&store, 0).await;
        account.add_consumption(Money::from_cents(10)).unwrap();
        store
            .inject_fault(StoreOperation::Commit, Fault::Fail("commit lost".to_string()))
            .await;

        let err = AtomicPlan::new()
            .update_consumption_total(account)
            .execute(&store)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Store(_)));
        assert!(
            store
                .find_account(id)
                .await
                .unwrap()
                .consumption_total()
                .is_zero()
        );
    }

    #[tokio::test]
    async fn test_unsaved_account_is_refused_before_writing() {
        let store = InMemoryStore::new();
        let unsaved = Account::create("new", "new@example.com").unwrap();

        let err = AtomicPlan::new()
            .update_consumption_total(unsaved)
            .execute(&store)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Store(StoreError::MissingId { entity: "account" })
        ));
        assert_eq!(
            store.operations().await,
            vec![StoreOperation::Begin, StoreOperation::Rollback]
        );
    }

    #[tokio::test]
    async fn test_mismatch_reports_the_written_account() {
        let store = InMemoryStore::new();
        let (id, account) = seeded(&store, 0).await;
        store
            .inject_fault(StoreOperation::UpdateConsumptionTotal, Fault::RowsAffected(0))
            .await;

        let err = AtomicPlan::new()
            .update_consumption_total(account)
            .execute(&store)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::AccountUpdateMismatch { account_id, .. } if account_id == id
        ));
    }

    #[test]
    fn test_builder_records_expected_rows() {
        let plan = AtomicPlan::new()
            .update_validity(OrderId::generate(), false)
            .save_order(Account::create_order(AccountId::generate(), Money::zero()).unwrap());

        let expected: Vec<_> = plan.steps().iter().map(Step::expected_rows).collect();
        assert_eq!(expected, vec![Some(1), None]);
        assert_eq!(plan.steps()[0].mutation().name(), "update_validity");
        assert_eq!(plan.steps()[1].mutation().name(), "save_order");
    }
}
