use serde::{Deserialize, Serialize};

/// What happens to the share of a source that cannot run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledSharePolicy {
    /// The disabled share is lost; if the primary is disabled, so is the remainder.
    #[default]
    Drop,
    /// Weights are renormalized over enabled sources.
    Redistribute,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaShare<'a> {
    pub source_id: &'a str,
    pub weight: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceQuota {
    pub source_id: String,
    pub quota: usize,
}

fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

fn floor_share(target: usize, weight: f64) -> usize {
    // float-to-int casts saturate
    (target as f64 * weight).floor() as usize
}

/// Splits `target` across `shares` in priority order. Only enabled sources
/// appear in the result.
///
/// Each source gets `floor(target * weight)` and the first participating
/// source absorbs `target - sum`, so with every source enabled the quotas sum
/// to `target`.
pub fn allocate(target: usize, shares: &[QuotaShare<'_>], policy: DisabledSharePolicy) -> Vec<SourceQuota> {
    let participating: Vec<(QuotaShare<'_>, f64)> = match policy {
        DisabledSharePolicy::Drop => shares.iter().map(|s| (*s, sanitize(s.weight))).collect(),
        DisabledSharePolicy::Redistribute => {
            let enabled = shares.iter().filter(|s| s.enabled).copied().collect::<Vec<_>>();
            let total: f64 = enabled.iter().map(|s| sanitize(s.weight)).sum();
            enabled
                .into_iter()
                .map(|s| {
                    let w = if total > 0.0 { sanitize(s.weight) / total } else { 0.0 };
                    (s, w)
                })
                .collect()
        }
    };

    let mut quotas = participating
        .iter()
        .map(|(_, w)| floor_share(target, *w))
        .collect::<Vec<_>>();
    let assigned = quotas.iter().fold(0usize, |acc, q| acc.saturating_add(*q));
    if let Some(primary) = quotas.first_mut() {
        *primary = primary.saturating_add(target.saturating_sub(assigned));
    }

    participating
        .into_iter()
        .zip(quotas)
        .filter(|((share, _), _)| share.enabled)
        .map(|((share, _), quota)| SourceQuota {
            source_id: share.source_id.to_string(),
            quota,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares<'a>(pairs: &[(&'a str, f64, bool)]) -> Vec<QuotaShare<'a>> {
        pairs
            .iter()
            .map(|(source_id, weight, enabled)| QuotaShare {
                source_id: *source_id,
                weight: *weight,
                enabled: *enabled,
            })
            .collect()
    }

    fn quotas(out: &[SourceQuota]) -> Vec<(&str, usize)> {
        out.iter().map(|q| (q.source_id.as_str(), q.quota)).collect()
    }

    const SCRAPING: [(&str, f64, bool); 4] = [
        ("pinterest", 0.6, true),
        ("wallhaven", 0.25, true),
        ("unsplash", 0.1, true),
        ("pexels", 0.05, true),
    ];

    #[test]
    fn all_enabled_quotas_sum_to_target_with_primary_remainder() {
        for target in [0usize, 1, 7, 20, 33, 150, 1001] {
            let out = allocate(target, &shares(&SCRAPING), DisabledSharePolicy::Drop);
            assert_eq!(out.iter().map(|q| q.quota).sum::<usize>(), target, "target {target}");
            let floors: usize = SCRAPING.iter().map(|(_, w, _)| (target as f64 * w).floor() as usize).sum();
            assert_eq!(out[0].quota, (target as f64 * 0.6).floor() as usize + (target - floors));
        }
        assert_eq!(
            quotas(&allocate(150, &shares(&SCRAPING), DisabledSharePolicy::Drop)),
            vec![("pinterest", 91), ("wallhaven", 37), ("unsplash", 15), ("pexels", 7)]
        );
    }

    #[test]
    fn drop_policy_loses_disabled_share() {
        let mut s = SCRAPING;
        s[2].2 = false;
        s[3].2 = false;
        let out = allocate(20, &shares(&s), DisabledSharePolicy::Drop);
        assert_eq!(quotas(&out), vec![("pinterest", 12), ("wallhaven", 5)]);

        let mut s = SCRAPING;
        s[0].2 = false;
        let out = allocate(20, &shares(&s), DisabledSharePolicy::Drop);
        assert_eq!(quotas(&out), vec![("wallhaven", 5), ("unsplash", 2), ("pexels", 1)]);
    }

    #[test]
    fn redistribute_policy_keeps_the_target() {
        let mut s = SCRAPING;
        s[0].2 = false;
        let out = allocate(20, &shares(&s), DisabledSharePolicy::Redistribute);
        assert_eq!(out.iter().map(|q| q.quota).sum::<usize>(), 20);
        assert_eq!(out[0].source_id, "wallhaven");
    }

    #[test]
    fn bad_weights_count_as_zero() {
        let s = shares(&[("a", f64::NAN, true), ("b", -1.0, true), ("c", 0.5, true)]);
        let out = allocate(10, &s, DisabledSharePolicy::Drop);
        assert_eq!(quotas(&out), vec![("a", 5), ("b", 0), ("c", 5)]);

        let out = allocate(10, &[], DisabledSharePolicy::Drop);
        assert!(out.is_empty());
    }
}
