use crate::error::DemoAccessError;
use crate::models::app::App;
use crate::storage::Storage;

/// The two independent ceilings enforced at issuance time: a per-IP+app
/// daily issuance cap (UTC calendar-day window) and a concurrent-active
/// cap (sliding on `end_time`). Both default to 2.
#[derive(Debug, Clone, Copy)]
pub struct QuotaCaps {
    pub daily: u32,
    pub concurrent: u32,
}

impl Default for QuotaCaps {
    fn default() -> Self {
        Self {
            daily: 2,
            concurrent: 2,
        }
    }
}

/// Pure counting logic over the session store. Consulted only by the
/// issuer; per-request re-validation is the validator's job.
#[derive(Debug, Clone, Copy)]
pub struct QuotaGate {
    caps: QuotaCaps,
}

impl QuotaGate {
    pub fn new(caps: QuotaCaps) -> Self {
        Self { caps }
    }

    pub fn caps(&self) -> QuotaCaps {
        self.caps
    }

    /// Daily cap first, then the concurrency cap; both denials carry the
    /// app summary so the caller can redirect to purchase.
    pub async fn check(
        &self,
        storage: &dyn Storage,
        ip_address: &str,
        app: &App,
    ) -> Result<(), DemoAccessError> {
        let today = storage
            .demo_session_count_today(ip_address, &app.id)
            .await?;
        if today >= self.caps.daily {
            return Err(DemoAccessError::QuotaExceeded {
                app: app.summary(),
            });
        }

        let active = storage
            .active_demo_session_count(ip_address, &app.id)
            .await?;
        if active >= self.caps.concurrent {
            return Err(DemoAccessError::ConcurrencyExceeded {
                app: app.summary(),
            });
        }

        Ok(())
    }
}
