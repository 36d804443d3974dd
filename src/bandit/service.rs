//! The bandit service: `recommend`, `debug_recommend`, `log_feedback`.
//!
//! Orchestrates candidate loading, config/segment/variant resolution,
//! context assembly, fused scoring and state persistence over the injected
//! store capabilities. All linear algebra happens on locally loaded state;
//! the stores are the only suspension points.
//!
//! Concurrency contract: each request is a read-modify-write against its
//! state keys with last-writer-wins at the store. Updates racing on the same
//! key may be lost under contention; the event log is always appended, so
//! ground truth is preserved. See DESIGN.md.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::Local;
use rand::Rng;
use tracing::{debug, warn};

use crate::bandit::candidates::CandidateLoader;
use crate::bandit::config::Config;
use crate::bandit::context::{base_context, merge_context, str_value, Context};
use crate::bandit::eligibility::{EligibilityChecker, NoopEligibility};
use crate::bandit::features::build_feature_vector;
use crate::bandit::gc::cap_arms;
use crate::bandit::math::{dot, invert, mat_vec_mul, Matrix, Vector, DECAY_RATE};
use crate::bandit::metrics::BanditMetrics;
use crate::bandit::resolver::{ConfigResolver, Resolved};
use crate::bandit::scoring::{thompson_score, ucb_score, Strategy};
use crate::bandit::state::{global_state_key, user_state_key, ArmState, SlotState};
use crate::bandit::trace::RequestContext;
use crate::domain::{BanditEvent, OfflineCandidate, Recommendation};
use crate::prelude::{Error, Result};
use crate::store::{
    ConfigStore, EventStore, OfflineCandidateStore, ProductCatalog, SegmentStore, StateStore,
    UserContextStore,
};

const DEFAULT_LIMIT: usize = 10;

/// Epoch milliseconds now.
pub(crate) fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Builder wiring the seven store capabilities into a [`BanditService`].
pub struct BanditServiceBuilder {
    state_store: Arc<dyn StateStore>,
    event_store: Arc<dyn EventStore>,
    offline: Option<Arc<dyn OfflineCandidateStore>>,
    catalog: Option<Arc<dyn ProductCatalog>>,
    config_store: Option<Arc<dyn ConfigStore>>,
    segment_store: Option<Arc<dyn SegmentStore>>,
    eligibility: Arc<dyn EligibilityChecker>,
    user_context: Option<Arc<dyn UserContextStore>>,
    metrics: Option<Arc<BanditMetrics>>,
    defaults: Config,
}

impl BanditServiceBuilder {
    pub fn with_offline_store(mut self, store: Arc<dyn OfflineCandidateStore>) -> Self {
        self.offline = Some(store);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn with_segment_store(mut self, store: Arc<dyn SegmentStore>) -> Self {
        self.segment_store = Some(store);
        self
    }

    pub fn with_eligibility(mut self, checker: Arc<dyn EligibilityChecker>) -> Self {
        self.eligibility = checker;
        self
    }

    pub fn with_user_context_store(mut self, store: Arc<dyn UserContextStore>) -> Self {
        self.user_context = Some(store);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<BanditMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_default_config(mut self, defaults: Config) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build(self) -> BanditService {
        let resolver = ConfigResolver::new(self.config_store.clone(), self.segment_store.clone())
            .with_defaults(self.defaults);
        BanditService {
            state_store: self.state_store,
            event_store: self.event_store,
            candidates: CandidateLoader::new(self.offline, self.catalog),
            resolver,
            config_store: self.config_store,
            segment_store: self.segment_store,
            eligibility: self.eligibility,
            user_context: self.user_context,
            metrics: self.metrics.unwrap_or_default(),
        }
    }
}

/// Online contextual-bandit recommender over offline candidates.
pub struct BanditService {
    pub(crate) state_store: Arc<dyn StateStore>,
    pub(crate) event_store: Arc<dyn EventStore>,
    pub(crate) candidates: CandidateLoader,
    pub(crate) resolver: ConfigResolver,
    pub(crate) config_store: Option<Arc<dyn ConfigStore>>,
    pub(crate) segment_store: Option<Arc<dyn SegmentStore>>,
    pub(crate) eligibility: Arc<dyn EligibilityChecker>,
    pub(crate) user_context: Option<Arc<dyn UserContextStore>>,
    pub(crate) metrics: Arc<BanditMetrics>,
}

impl BanditService {
    /// Start wiring a service around the two mandatory capabilities.
    pub fn builder(
        state_store: Arc<dyn StateStore>,
        event_store: Arc<dyn EventStore>,
    ) -> BanditServiceBuilder {
        BanditServiceBuilder {
            state_store,
            event_store,
            offline: None,
            catalog: None,
            config_store: None,
            segment_store: None,
            eligibility: Arc::new(NoopEligibility),
            user_context: None,
            metrics: None,
            defaults: Config::default(),
        }
    }

    pub fn metrics(&self) -> Arc<BanditMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Recommend up to `limit` products for `user_id` on `slot`.
    ///
    /// Read-modify-write: scoring materializes arms for unseen candidates,
    /// and both state keys are persisted before returning.
    pub async fn recommend(
        &self,
        ctx: &RequestContext,
        user_id: u64,
        slot: &str,
        limit: usize,
        req_ctx: Option<&Context>,
    ) -> Result<Vec<Recommendation>> {
        let started = Instant::now();
        let result = self
            .recommend_inner(ctx, user_id, slot, limit, req_ctx)
            .await;
        self.metrics
            .observe_recommend_latency_ms(started.elapsed().as_secs_f64() * 1e3);
        if result.is_err() {
            self.metrics.record_error();
        }
        result
    }

    async fn recommend_inner(
        &self,
        ctx: &RequestContext,
        user_id: u64,
        slot: &str,
        limit: usize,
        req_ctx: Option<&Context>,
    ) -> Result<Vec<Recommendation>> {
        ctx.check()?;
        validate_identity(user_id, slot)?;
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };

        let (rows, limit) = self.candidates.load(slot, limit).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let resolved = self.resolver.resolve_for_user(user_id, slot).await;
        let merged = self.assemble_context(user_id, &resolved, req_ctx).await;
        ctx.check()?;

        debug!(
            trace_id = ctx.trace_id(),
            user_id,
            slot,
            segment = resolved.segment,
            variant = resolved.variant,
            limit,
            candidates = rows.len(),
            "bandit recommend"
        );

        let global_key = global_state_key(slot, resolved.segment);
        let user_key = user_state_key(slot, resolved.segment, user_id);
        let mut global = self.load_state_or_default(&global_key).await?;
        let mut user = self.load_state_or_default(&user_key).await?;

        let eligible = self.filter_eligible(user_id, slot, rows).await;
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        let strategy = Strategy::for_variant(resolved.variant);
        let max_offline = max_offline_score(&eligible);

        // Pure CPU from here to the saves; the RNG stays out of await scope.
        let top = {
            let mut rng = rand::thread_rng();
            let mut scored = Vec::with_capacity(eligible.len());
            for row in &eligible {
                let x = build_feature_vector(
                    user_id,
                    slot,
                    row.product_id,
                    &resolved.config,
                    resolved.segment,
                    &merged,
                );
                let breakdown = score_candidate(
                    &mut rng,
                    &resolved.config,
                    strategy,
                    &mut global,
                    &mut user,
                    row,
                    max_offline,
                    &x,
                )?;

                let mut final_score = breakdown.final_score;
                if strategy != Strategy::OfflineOnly && resolved.config.explore_noise > 0.0 {
                    final_score += rng.gen_range(0.0..resolved.config.explore_noise);
                }
                scored.push(Recommendation {
                    product_id: row.product_id,
                    score: final_score,
                });
            }
            select_top_n(scored, limit, |rec| rec.score)
        };

        // Scoring may have materialized fresh arms; persist both keys.
        self.state_store.save_state(&global_key, &global).await?;
        self.state_store.save_state(&user_key, &user).await?;

        Ok(top)
    }

    /// Apply one feedback event to both the global and per-user arm, then
    /// append the event to the immutable log.
    pub async fn log_feedback(&self, ctx: &RequestContext, event: BanditEvent) -> Result<()> {
        let started = Instant::now();
        let result = self.log_feedback_inner(ctx, event).await;
        self.metrics
            .observe_feedback_latency_ms(started.elapsed().as_secs_f64() * 1e3);
        if result.is_err() {
            self.metrics.record_error();
        }
        result
    }

    async fn log_feedback_inner(&self, ctx: &RequestContext, mut event: BanditEvent) -> Result<()> {
        ctx.check()?;
        if event.event_type.is_empty() {
            return Err(Error::invalid_argument("event_type is required"));
        }
        validate_identity(event.user_id, &event.slot)?;

        let resolved = self.resolver.resolve_for_user(event.user_id, &event.slot).await;

        // Same context assembly as recommend; the event's own context wins
        // on conflict and the merged map is written back so it persists.
        let caller = std::mem::take(&mut event.context);
        event.context = self
            .assemble_context(event.user_id, &resolved, Some(&caller))
            .await;

        let reward = resolved.config.reward_for_event(&event)?;
        event.variant = resolved.variant;

        let now_ms = now_epoch_ms();
        if event.created_at == 0 {
            event.created_at = now_ms;
        }
        ctx.check()?;

        debug!(
            trace_id = ctx.trace_id(),
            user_id = event.user_id,
            slot = %event.slot,
            product_id = event.product_id,
            event_type = %event.event_type,
            segment = resolved.segment,
            variant = resolved.variant,
            reward,
            "bandit feedback"
        );

        let global_key = global_state_key(&event.slot, resolved.segment);
        let user_key = user_state_key(&event.slot, resolved.segment, event.user_id);
        let mut global = self.load_state_or_default(&global_key).await?;
        let mut user = self.load_state_or_default(&user_key).await?;

        let x = build_feature_vector(
            event.user_id,
            &event.slot,
            event.product_id,
            &resolved.config,
            resolved.segment,
            &event.context,
        );

        global
            .arm_mut(event.product_id)
            .observe(&x, reward, DECAY_RATE, now_ms);
        user.arm_mut(event.product_id)
            .observe(&x, reward, DECAY_RATE, now_ms);

        cap_arms(&mut global, resolved.config.max_arms_per_state);
        cap_arms(&mut user, resolved.config.max_arms_per_state);

        // On success both bandit state and the event log are updated; any
        // persistence failure fails the request.
        self.state_store.save_state(&global_key, &global).await?;
        self.state_store.save_state(&user_key, &user).await?;
        self.event_store.save_event(&event).await?;

        self.metrics.record_feedback_event(
            &event.slot,
            &event.event_type,
            resolved.segment,
            resolved.variant,
        );

        Ok(())
    }

    pub(crate) async fn load_state_or_default(&self, key: &str) -> Result<SlotState> {
        Ok(self.state_store.get_state(key).await?.unwrap_or_default())
    }

    /// Base context + optional user enrichment, merged under the caller's
    /// context (caller wins). Enrichment errors are swallowed.
    pub(crate) async fn assemble_context(
        &self,
        user_id: u64,
        resolved: &Resolved,
        caller: Option<&Context>,
    ) -> Context {
        let platform = caller.and_then(|c| str_value(c, "platform")).unwrap_or("");
        let mut base = base_context(Local::now(), platform, resolved.segment, resolved.variant);

        if let Some(store) = &self.user_context {
            match store.get_user_context(user_id).await {
                Ok(user_ctx) => {
                    if let Some(tier) = user_ctx.tier {
                        base.insert("user_tier".to_string(), tier.into());
                    }
                    if let Some(campaign) = user_ctx.campaign_id {
                        base.insert("campaign_id".to_string(), campaign.into());
                    }
                }
                Err(err) => {
                    debug!(user_id, %err, "user context enrichment failed");
                }
            }
        }

        match caller {
            Some(overrides) => merge_context(base, overrides),
            None => base,
        }
    }

    /// Drop ineligible candidates. The checker is advisory: errors count as
    /// "not eligible".
    pub(crate) async fn filter_eligible(
        &self,
        user_id: u64,
        slot: &str,
        rows: Vec<OfflineCandidate>,
    ) -> Vec<OfflineCandidate> {
        let mut eligible = Vec::with_capacity(rows.len());
        for row in rows {
            match self
                .eligibility
                .is_eligible(user_id, row.product_id, slot)
                .await
            {
                Ok(true) => eligible.push(row),
                Ok(false) => {}
                Err(err) => {
                    warn!(user_id, product_id = row.product_id, slot, %err,
                        "eligibility check failed, dropping candidate");
                }
            }
        }
        eligible
    }
}

fn validate_identity(user_id: u64, slot: &str) -> Result<()> {
    if user_id == 0 {
        return Err(Error::invalid_argument("user_id is required"));
    }
    if slot.is_empty() {
        return Err(Error::invalid_argument("slot is required"));
    }
    Ok(())
}

/// Largest offline score in the pool; 1 when all scores are zero so the
/// normalization is a no-op instead of a division by zero.
pub(crate) fn max_offline_score(rows: &[OfflineCandidate]) -> f64 {
    let max = rows.iter().map(|r| r.score).fold(0.0, f64::max);
    if max == 0.0 {
        1.0
    } else {
        max
    }
}

/// Full scoring breakdown for one candidate. The UCB decomposition refers to
/// the global arm; `bandit_score` blends global and user per the strategy.
pub(crate) struct CandidateScore {
    pub offline_normalized: f64,
    pub mean: f64,
    pub uncertainty: f64,
    pub ucb: f64,
    pub final_score: f64,
    pub features: Vector,
}

/// Score one candidate against the global and per-user arms, materializing
/// them if missing. Shared by `recommend` and `debug_recommend`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn score_candidate<R: Rng + ?Sized>(
    rng: &mut R,
    cfg: &Config,
    strategy: Strategy,
    global: &mut SlotState,
    user: &mut SlotState,
    row: &OfflineCandidate,
    max_offline: f64,
    x: &Vector,
) -> Result<CandidateScore> {
    let pid = row.product_id;

    let (g_inv, theta_g) = arm_posterior(global.arm_mut(pid))?;
    let (u_inv, theta_u) = arm_posterior(user.arm_mut(pid))?;

    let mean = dot(&theta_g, x);
    let tmp = mat_vec_mul(&g_inv, x);
    let uncertainty = dot(x, &tmp).sqrt();
    let ucb = mean + cfg.alpha * uncertainty;

    let (w_global, w_user) = cfg.effective_state_weights();
    let bandit_score = match strategy {
        Strategy::OfflineOnly => 0.0,
        Strategy::Thompson => {
            w_global * thompson_score(rng, &theta_g, x, &g_inv)
                + w_user * thompson_score(rng, &theta_u, x, &u_inv)
        }
        Strategy::Ucb => {
            w_global * ucb + w_user * ucb_score(&theta_u, x, &u_inv, cfg.alpha)
        }
    };

    let offline_normalized = row.score / max_offline;
    let final_score = cfg.w_bandit * bandit_score + cfg.w_offline * offline_normalized;

    Ok(CandidateScore {
        offline_normalized,
        mean,
        uncertainty,
        ucb,
        final_score,
        features: *x,
    })
}

/// Inverse and theta for one arm. A singular matrix resets the arm to its
/// cold-start state and retries once; a second failure is `Internal`.
fn arm_posterior(arm: &mut ArmState) -> Result<(Matrix, Vector)> {
    let inv = match invert(&arm.a) {
        Ok(inv) => inv,
        Err(_) => {
            warn!("singular arm matrix, resetting arm");
            arm.reset();
            invert(&arm.a)
                .map_err(|_| Error::Internal("arm matrix singular after reset".to_string()))?
        }
    };
    let theta = mat_vec_mul(&inv, &arm.b);
    Ok((inv, theta))
}

/// Top-`limit` items by score, non-increasing, via repeated argmax.
/// Ties keep their prior relative position.
pub(crate) fn select_top_n<T, F>(mut items: Vec<T>, limit: usize, score: F) -> Vec<T>
where
    F: Fn(&T) -> f64,
{
    let limit = limit.min(items.len());
    for i in 0..limit {
        let mut max_idx = i;
        for j in i + 1..items.len() {
            if score(&items[j]) > score(&items[max_idx]) {
                max_idx = j;
            }
        }
        items.swap(i, max_idx);
    }
    items.truncate(limit);
    items
}
