//! Earn-by-watching-ads rewards.
//!
//! Users watch promotional spots from the catalog and the reward lands in
//! their wallet at most once per (account, ad). Admins manage the catalog;
//! pulled ads stay on record so past rewards keep their provenance.

use crate::error::LedgerResult;
use crate::money::{from_amount, to_amount, Amount};
use crate::notifier::{LedgerEvent, Notifier};
use crate::store::{Ad, AdStore, AdWatch};
use tracing::info;

/// How many active ads the earn page offers per request.
const EARN_PAGE_SIZE: usize = 6;

#[derive(Clone)]
pub struct AdEarnings {
    ads: AdStore,
    notifier: Notifier,
}

impl AdEarnings {
    pub fn new(ads: AdStore, notifier: Notifier) -> Self {
        Self { ads, notifier }
    }

    /// A rotating selection of active ads to watch.
    pub async fn catalog(&self) -> LedgerResult<Vec<Ad>> {
        self.ads.sample_active(EARN_PAGE_SIZE).await
    }

    /// Credit the ad's reward to the viewer. Repeat watches of the same ad
    /// are rejected without touching the wallet.
    pub async fn watch(
        &self,
        account_id: &str,
        ad_id: &str,
    ) -> LedgerResult<(AdWatch, Amount)> {
        let (watch, balance) = self.ads.record_watch(account_id, ad_id).await?;

        self.notifier.publish(LedgerEvent::new(
            "ad_reward_earned",
            account_id,
            &watch.ad_id,
            watch.reward,
            format!("Reward for watching \"{}\"", watch.ad_title),
        ));
        info!(
            "📺 Account {} earned {} watching \"{}\"",
            account_id,
            from_amount(watch.reward),
            watch.ad_title
        );
        Ok((watch, balance))
    }

    pub async fn history(&self, account_id: &str) -> LedgerResult<Vec<AdWatch>> {
        self.ads.watches_by_account(account_id).await
    }

    pub async fn all_ads(&self) -> LedgerResult<Vec<Ad>> {
        self.ads.list_all().await
    }

    pub async fn create_ad(
        &self,
        title: &str,
        description: &str,
        video_url: &str,
        reward: f64,
        duration_secs: i64,
    ) -> LedgerResult<Ad> {
        let ad = self
            .ads
            .create(title, description, video_url, to_amount(reward), duration_secs)
            .await?;
        info!("📺 Ad \"{}\" added to the catalog", ad.title);
        Ok(ad)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_ad(
        &self,
        id: &str,
        title: &str,
        description: &str,
        video_url: &str,
        reward: f64,
        duration_secs: i64,
        is_active: bool,
    ) -> LedgerResult<Ad> {
        self.ads
            .update(
                id,
                title,
                description,
                video_url,
                to_amount(reward),
                duration_secs,
                is_active,
            )
            .await
    }
}
