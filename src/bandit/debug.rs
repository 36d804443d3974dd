//! `debug_recommend`: the full per-candidate score breakdown.
//!
//! Identical control flow to `recommend`, with three deliberate
//! differences: no exploration noise, no state persistence (read-only), and
//! every score component is reported.

use tracing::debug;

use crate::bandit::context::Context;
use crate::bandit::features::build_feature_vector;
use crate::bandit::scoring::Strategy;
use crate::bandit::service::{max_offline_score, score_candidate, select_top_n, BanditService};
use crate::bandit::state::{global_state_key, user_state_key};
use crate::bandit::trace::RequestContext;
use crate::domain::DebugRecommendation;
use crate::prelude::{Error, Result};

const DEFAULT_LIMIT: usize = 10;

impl BanditService {
    /// Score candidates exactly as `recommend` would and report every
    /// component per candidate. Noise-free and read-only.
    pub async fn debug_recommend(
        &self,
        ctx: &RequestContext,
        user_id: u64,
        slot: &str,
        limit: usize,
        req_ctx: Option<&Context>,
    ) -> Result<Vec<DebugRecommendation>> {
        ctx.check()?;
        if user_id == 0 {
            return Err(Error::invalid_argument("user_id is required"));
        }
        if slot.is_empty() {
            return Err(Error::invalid_argument("slot is required"));
        }
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
            "bandit debug recommend"
        );

        // Local copies only: materialized arms are discarded, never saved.
        let mut global = self
            .load_state_or_default(&global_state_key(slot, resolved.segment))
            .await?;
        let mut user = self
            .load_state_or_default(&user_state_key(slot, resolved.segment, user_id))
            .await?;

        let eligible = self.filter_eligible(user_id, slot, rows).await;
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        let strategy = Strategy::for_variant(resolved.variant);
        let max_offline = max_offline_score(&eligible);

        let records = {
            let mut rng = rand::thread_rng();
            let mut records = Vec::with_capacity(eligible.len());
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

                records.push(DebugRecommendation {
                    product_id: row.product_id,
                    offline_score: row.score,
                    offline_normalized: breakdown.offline_normalized,
                    bandit_mean: breakdown.mean,
                    bandit_uncertainty: breakdown.uncertainty,
                    bandit_ucb: breakdown.ucb,
                    final_score: breakdown.final_score,
                    features: breakdown.features.to_vec(),
                    context: merged.clone(),
                    segment: resolved.segment,
                    variant: resolved.variant,
                });
            }
            records
        };

        Ok(select_top_n(records, limit, |rec| rec.final_score))
    }
}
