use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{Principal, Receipt, ResultEngine, Transaction, transactions};

use super::Engine;

/// A receipt as stored in the system-of-record, with its transaction once processed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReceiptDetails {
    pub receipt: Receipt,
    pub transaction: Option<Transaction>,
}

impl Engine {
    pub async fn receipt(
        &self,
        principal: &Principal,
        receipt_id: i64,
    ) -> ResultEngine<ReceiptDetails> {
        principal.ensure_active()?;
        let model = self.require_receipt(receipt_id).await?;
        principal.ensure_owner_or_admin(model.uploader_id)?;

        let transaction = transactions::Entity::find()
            .filter(transactions::Column::ReceiptId.eq(receipt_id))
            .one(&self.database)
            .await?
            .map(Transaction::try_from)
            .transpose()?;
        Ok(ReceiptDetails {
            receipt: Receipt::try_from(model)?,
            transaction,
        })
    }

    /// Transactions paid by the caller, newest transaction date first.
    pub async fn transactions_for_payer(
        &self,
        principal: &Principal,
    ) -> ResultEngine<Vec<Transaction>> {
        principal.ensure_active()?;
        transactions::Entity::find()
            .filter(transactions::Column::PayerId.eq(principal.id))
            .order_by_desc(transactions::Column::TransactionDate)
            .order_by_desc(transactions::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }
}
