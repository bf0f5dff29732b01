use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{
    NewPurchase, Purchase, PurchaseKind, PurchaseStatus, RecordId, Season, Session, Title, TitleId,
};
use crate::store::StoreApi;

pub const MOVIE_BASE_PRICE: f64 = 3.99;
pub const SEASON_BASE_PRICE: f64 = 2.99;
pub const CANCEL_WINDOW_HOURS: i64 = 24;

pub fn movie_price(title: &Title) -> f64 {
    let mut price = MOVIE_BASE_PRICE;
    if title.vote_average >= 8.0 {
        price += 2.00;
    } else if title.vote_average >= 7.0 {
        price += 1.00;
    }
    if title.popularity > 100.0 {
        price += 1.00;
    }
    round_cents(price)
}

pub fn season_price(season: &Season) -> f64 {
    let mut price = SEASON_BASE_PRICE;
    if season.episode_count > 10 {
        price += 1.00;
    } else if season.episode_count > 6 {
        price += 0.50;
    }
    if season.vote_average >= 8.0 {
        price += 1.00;
    } else if season.vote_average >= 7.0 {
        price += 0.50;
    }
    round_cents(price)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Cancellation is allowed up to and including the 24h mark.
pub fn within_cancel_window(purchased_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - purchased_at <= Duration::hours(CANCEL_WINDOW_HOURS)
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub message: String,
    pub purchase: Purchase,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelReceipt {
    pub message: String,
    pub purchase_id: RecordId,
}

#[derive(Debug, Default)]
struct LedgerState {
    owner: Option<RecordId>,
    purchases: Vec<Purchase>,
}

/// In-memory mirror of the current user's confirmed purchases. Every mutation
/// is written to the store first and applied locally only on success.
pub struct Ledger {
    store: Arc<dyn StoreApi>,
    state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new(store: Arc<dyn StoreApi>) -> Self {
        Self {
            store,
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Replaces the local list with the owner's remote purchases.
    pub async fn reload(&self, session: &Session) -> AppResult<usize> {
        let user_id = session.user_id();
        match self.store.list_purchases(user_id).await {
            Ok(purchases) => {
                let count = purchases.len();
                let mut state = self.state.write().await;
                state.owner = Some(user_id.to_string());
                state.purchases = purchases;
                info!(user_id, count, "Purchases loaded");
                Ok(count)
            }
            Err(err) => {
                let mut state = self.state.write().await;
                if state.owner.as_deref() != Some(user_id) {
                    state.owner = None;
                    state.purchases.clear();
                }
                warn!(user_id, error = %format!("{:#}", err), "Failed to load purchases");
                Err(AppError::persistence(err))
            }
        }
    }

    async fn ensure_owner(&self, session: &Session) -> AppResult<()> {
        let current = self.state.read().await.owner.clone();
        if current.as_deref() != Some(session.user_id()) {
            self.reload(session).await?;
        }
        Ok(())
    }

    pub async fn purchase(
        &self,
        session: Option<&Session>,
        title: &Title,
    ) -> AppResult<PurchaseReceipt> {
        let session = session.ok_or_else(|| {
            AppError::NotAuthenticated("You must be logged in to purchase a movie".into())
        })?;
        self.ensure_owner(session).await?;

        let request = NewPurchase {
            user_id: session.user_id().to_string(),
            title_id: title.id,
            title_name: title.name.clone(),
            purchased_at: Utc::now(),
            price: movie_price(title),
            status: PurchaseStatus::Completed,
            kind: PurchaseKind::Movie,
            season_number: None,
            season_name: None,
        };
        let purchase = self.write(request).await?;
        let message = format!(
            "Purchase complete! You bought \"{}\" for €{:.2}",
            purchase.title_name, purchase.price
        );
        Ok(PurchaseReceipt { message, purchase })
    }

    pub async fn purchase_season(
        &self,
        session: Option<&Session>,
        title: &Title,
        season: &Season,
    ) -> AppResult<PurchaseReceipt> {
        let session = session.ok_or_else(|| {
            AppError::NotAuthenticated("You must be logged in to purchase a season".into())
        })?;
        self.ensure_owner(session).await?;

        let request = NewPurchase {
            user_id: session.user_id().to_string(),
            title_id: title.id,
            title_name: title.name.clone(),
            purchased_at: Utc::now(),
            price: season_price(season),
            status: PurchaseStatus::Completed,
            kind: PurchaseKind::Season,
            season_number: Some(season.season_number),
            season_name: Some(season.name.clone()),
        };
        let purchase = self.write(request).await?;
        let message = format!(
            "Purchase complete! You bought \"{}\" of \"{}\" for €{:.2}",
            season.name, purchase.title_name, purchase.price
        );
        Ok(PurchaseReceipt { message, purchase })
    }

    async fn write(&self, request: NewPurchase) -> AppResult<Purchase> {
        let purchase = self.store.create_purchase(&request).await.map_err(|err| {
            warn!(
                title_id = request.title_id,
                error = %format!("{:#}", err),
                "Purchase write failed"
            );
            AppError::persistence(err)
        })?;
        info!(
            purchase_id = %purchase.id,
            title_id = purchase.title_id,
            kind = ?purchase.kind,
            price = purchase.price,
            "Purchase recorded"
        );
        {
            let mut state = self.state.write().await;
            if state.owner.as_deref() == Some(request.user_id.as_str()) {
                state.purchases.push(purchase.clone());
                return Ok(purchase);
            }
        }

        // The session ended while the write was in flight.
        warn!(
            purchase_id = %purchase.id,
            user_id = %request.user_id,
            "Owner changed before purchase was confirmed, revoking"
        );
        if let Err(err) = self.store.delete_purchase(&purchase.id).await {
            warn!(
                purchase_id = %purchase.id,
                error = %format!("{:#}", err),
                "Revoking orphaned purchase failed"
            );
        }
        Err(AppError::NotAuthenticated(
            "Session ended before the purchase was confirmed".into(),
        ))
    }

    pub async fn cancel(
        &self,
        session: Option<&Session>,
        purchase_id: &str,
    ) -> AppResult<CancelReceipt> {
        self.cancel_at(session, purchase_id, Utc::now()).await
    }

    pub async fn cancel_at(
        &self,
        session: Option<&Session>,
        purchase_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<CancelReceipt> {
        if let Some(session) = session {
            self.ensure_owner(session).await?;
        }

        let purchase = self
            .state
            .read()
            .await
            .purchases
            .iter()
            .find(|p| p.id == purchase_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("purchase {purchase_id}")))?;

        if !within_cancel_window(purchase.purchased_at, now) {
            return Err(AppError::WindowExpired);
        }

        self.store
            .delete_purchase(&purchase.id)
            .await
            .map_err(|err| {
                warn!(purchase_id, error = %format!("{:#}", err), "Cancellation failed");
                AppError::persistence(err)
            })?;

        self.state
            .write()
            .await
            .purchases
            .retain(|p| p.id != purchase.id);
        info!(purchase_id, title_id = purchase.title_id, "Purchase cancelled");

        Ok(CancelReceipt {
            message: format!("Purchase of \"{}\" cancelled", purchase.title_name),
            purchase_id: purchase.id,
        })
    }

    /// Whether the title was bought as a movie. Season purchases don't count.
    pub async fn is_purchased(&self, title_id: TitleId) -> bool {
        self.state
            .read()
            .await
            .purchases
            .iter()
            .any(|p| p.title_id == title_id && p.kind != PurchaseKind::Season)
    }

    pub async fn is_season_purchased(&self, title_id: TitleId, season_number: u32) -> bool {
        self.state.read().await.purchases.iter().any(|p| {
            p.title_id == title_id
                && p.kind == PurchaseKind::Season
                && p.season_number == Some(season_number)
        })
    }

    pub async fn purchased_seasons(&self, title_id: TitleId) -> Vec<u32> {
        let state = self.state.read().await;
        let mut seasons: Vec<u32> = state
            .purchases
            .iter()
            .filter(|p| p.title_id == title_id && p.kind == PurchaseKind::Season)
            .filter_map(|p| p.season_number)
            .collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }

    pub async fn find_by_title(&self, title_id: TitleId) -> Option<Purchase> {
        self.state
            .read()
            .await
            .purchases
            .iter()
            .find(|p| p.title_id == title_id && p.kind == PurchaseKind::Movie)
            .cloned()
    }

    pub async fn purchases(&self) -> Vec<Purchase> {
        self.state.read().await.purchases.clone()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.owner = None;
        state.purchases.clear();
    }
}
