use serde_json::json;

use crate::audit::AuditAction;
use crate::principal::Role;
use crate::rates::RefreshReport;
use crate::{Principal, ResultEngine};

use super::Engine;

impl Engine {
    /// Manual refresh of the exchange rates. Safe to race the scheduler.
    pub async fn refresh_exchange_rates(
        &self,
        principal: &Principal,
    ) -> ResultEngine<RefreshReport> {
        let result = async {
            principal.ensure_role(&[Role::SystemAdmin])?;
            self.rates.refresh_rates().await
        }
        .await;
        self.audit(
            AuditAction::RefreshExchangeRates,
            principal,
            None,
            &result,
            json!({ "report": result.as_ref().ok() }),
        )
        .await;
        result
    }
}
