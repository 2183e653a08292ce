//! Per-session style counters with lazy expiry.

use std::sync::Arc;

use dashmap::DashMap;
use prep_core::Clock;
use prep_core::model::{
    ExamId, Objective, ObjectiveId, QuestionStyle, SessionId, StyleCounts, StyleDistributionState,
};
use prep_core::settings::EngineSettings;
use prep_core::style::StyleSelector;
use serde::Serialize;
use tracing::{debug, info};

/// Shared handle to the session-keyed style state.
///
/// Owned by the hosting service and passed to every tracker that needs it.
#[derive(Debug, Clone, Default)]
pub struct StyleStateStore {
    states: Arc<DashMap<SessionId, StyleDistributionState>>,
}

impl StyleStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Deviation of one style from its target, in percentage points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleDeviation {
    pub style: QuestionStyle,
    pub current_percent: f64,
    pub target_percent: f64,
    /// `current - target`; positive means over-represented.
    pub deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionHealth {
    /// 0-100, 100 when the observed mix matches the target.
    pub score: f64,
    pub per_style: Vec<StyleDeviation>,
    pub recommendations: Vec<String>,
}

pub struct StyleDistributionTracker {
    store: StyleStateStore,
    selector: Arc<StyleSelector>,
    clock: Clock,
    ttl_secs: u64,
    deviation_threshold: f64,
}

impl StyleDistributionTracker {
    #[must_use]
    pub fn new(
        store: StyleStateStore,
        selector: Arc<StyleSelector>,
        settings: &EngineSettings,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            selector,
            clock,
            ttl_secs: settings.style_state_ttl_secs(),
            deviation_threshold: settings.health_deviation_threshold(),
        }
    }

    #[must_use]
    pub fn selector(&self) -> &StyleSelector {
        &self.selector
    }

    /// Count one generated question. Expired state is replaced first.
    pub fn record(
        &self,
        session_id: SessionId,
        exam_id: &ExamId,
        objective_id: &ObjectiveId,
        style: QuestionStyle,
    ) {
        let now = self.clock.now();
        let mut entry = self
            .store
            .states
            .entry(session_id)
            .or_insert_with(|| StyleDistributionState::new(exam_id.clone(), now));
        if entry.is_expired(now, self.ttl_secs) {
            debug!(session = %session_id, "style state expired, starting fresh");
            *entry = StyleDistributionState::new(exam_id.clone(), now);
        }
        entry.record(objective_id, style, now);
    }

    /// Live state for a session, or `None` if absent or idle past the TTL.
    /// Expired entries are removed on the way out.
    #[must_use]
    pub fn snapshot(&self, session_id: SessionId) -> Option<StyleDistributionState> {
        let now = self.clock.now();
        let state = self.store.states.get(&session_id).map(|s| s.clone())?;
        if state.is_expired(now, self.ttl_secs) {
            self.store
                .states
                .remove_if(&session_id, |_, s| s.is_expired(now, self.ttl_secs));
            return None;
        }
        Some(state)
    }

    /// Counts for one objective within a session.
    #[must_use]
    pub fn objective_counts(&self, session_id: SessionId, objective_id: &ObjectiveId) -> StyleCounts {
        self.snapshot(session_id)
            .map(|s| s.objective_counts(objective_id))
            .unwrap_or_default()
    }

    /// Style to request next for `objective`, from its own history.
    #[must_use]
    pub fn next_style(
        &self,
        session_id: SessionId,
        exam_id: &ExamId,
        objective: &Objective,
    ) -> QuestionStyle {
        let counts = self.objective_counts(session_id, &objective.id);
        self.selector
            .select(exam_id, objective, &counts, counts.total())
    }

    /// Compare the session's overall mix against the exam's target mix.
    #[must_use]
    pub fn health(&self, session_id: SessionId, exam_id: &ExamId) -> DistributionHealth {
        let target = self.selector.exam_mix(exam_id).normalized();
        let counts = self
            .snapshot(session_id)
            .map(|s| s.overall)
            .unwrap_or_default();

        if counts.total() == 0 {
            return DistributionHealth {
                score: 100.0,
                per_style: QuestionStyle::ALL
                    .iter()
                    .map(|&style| StyleDeviation {
                        style,
                        current_percent: 0.0,
                        target_percent: target.get(style) * 100.0,
                        deviation: 0.0,
                    })
                    .collect(),
                recommendations: Vec::new(),
            };
        }

        let mut total_abs = 0.0;
        let mut per_style = Vec::with_capacity(QuestionStyle::ALL.len());
        let mut recommendations = Vec::new();
        for &style in &QuestionStyle::ALL {
            let current = counts.share(style);
            let wanted = target.get(style);
            total_abs += (current - wanted).abs();
            let deviation = (current - wanted) * 100.0;
            if deviation.abs() > self.deviation_threshold {
                let direction = if deviation > 0.0 { "Fewer" } else { "More" };
                recommendations.push(format!(
                    "{direction} {style} questions needed ({:.0}% vs {:.0}% target)",
                    current * 100.0,
                    wanted * 100.0
                ));
            }
            per_style.push(StyleDeviation {
                style,
                current_percent: current * 100.0,
                target_percent: wanted * 100.0,
                deviation,
            });
        }

        DistributionHealth {
            score: (100.0 - 100.0 * total_abs).max(0.0),
            per_style,
            recommendations,
        }
    }

    /// Drop a session's counters. Returns whether anything was held.
    pub fn reset(&self, session_id: SessionId) -> bool {
        self.store.states.remove(&session_id).is_some()
    }

    /// Remove every expired entry. Returns how many were reclaimed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.store.states.len();
        self.store
            .states
            .retain(|_, state| !state.is_expired(now, self.ttl_secs));
        let removed = before.saturating_sub(self.store.states.len());
        if removed > 0 {
            info!(removed, "swept expired style state");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prep_core::model::CognitiveLevel;
    use prep_core::time::{fixed_clock, fixed_now};
    use proptest::prelude::*;

    fn tracker_at(store: &StyleStateStore, clock: Clock) -> StyleDistributionTracker {
        StyleDistributionTracker::new(
            store.clone(),
            Arc::new(StyleSelector::new()),
            &EngineSettings::default(),
            clock,
        )
    }

    fn exam() -> ExamId {
        ExamId::new("exam")
    }

    fn record_n(t: &StyleDistributionTracker, session: SessionId, style: QuestionStyle, n: u32) {
        for _ in 0..n {
            t.record(session, &exam(), &ObjectiveId::new("1.1"), style);
        }
    }

    #[test]
    fn matching_mix_is_fully_healthy() {
        let store = StyleStateStore::new();
        let t = tracker_at(&store, fixed_clock());
        let s = SessionId::generate();
        record_n(&t, s, QuestionStyle::Direct, 6);
        record_n(&t, s, QuestionStyle::Scenario, 3);
        record_n(&t, s, QuestionStyle::CaseStudy, 1);

        let health = t.health(s, &exam());
        assert!((health.score - 100.0).abs() < 1e-9);
        assert!(health.recommendations.is_empty());
    }

    #[test]
    fn skewed_mix_is_flagged() {
        let store = StyleStateStore::new();
        let t = tracker_at(&store, fixed_clock());
        let s = SessionId::generate();
        record_n(&t, s, QuestionStyle::Direct, 10);

        let health = t.health(s, &exam());
        // |1.0-0.6| + |0-0.3| + |0-0.1| = 0.8
        assert!((health.score - 20.0).abs() < 1e-9);
        assert_eq!(health.recommendations.len(), 2);
        assert!(health.recommendations[0].starts_with("Fewer direct"));
        assert!(health.recommendations[1].starts_with("More scenario"));
        let direct = &health.per_style[0];
        assert!((direct.deviation - 40.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_session_is_healthy_and_empty() {
        let t = tracker_at(&StyleStateStore::new(), fixed_clock());
        let health = t.health(SessionId::generate(), &exam());
        assert_eq!(health.score, 100.0);
        assert!(health.recommendations.is_empty());
    }

    #[test]
    fn idle_state_expires_on_read_without_a_sweep() {
        let store = StyleStateStore::new();
        let s = SessionId::generate();
        tracker_at(&store, fixed_clock()).record(
            s,
            &exam(),
            &ObjectiveId::new("1.1"),
            QuestionStyle::Scenario,
        );

        let later = Clock::fixed(fixed_now() + Duration::hours(2));
        let t = tracker_at(&store, later);
        assert!(t.snapshot(s).is_none());
        assert!(store.is_empty());

        let almost = Clock::fixed(fixed_now() + Duration::minutes(119));
        let t = tracker_at(&store, almost);
        t.record(s, &exam(), &ObjectiveId::new("1.1"), QuestionStyle::Direct);
        assert_eq!(t.snapshot(s).map(|st| st.total), Some(1));
    }

    #[test]
    fn record_after_expiry_starts_fresh() {
        let store = StyleStateStore::new();
        let s = SessionId::generate();
        record_n(&tracker_at(&store, fixed_clock()), s, QuestionStyle::Direct, 4);

        let t = tracker_at(&store, Clock::fixed(fixed_now() + Duration::hours(3)));
        t.record(s, &exam(), &ObjectiveId::new("1.1"), QuestionStyle::CaseStudy);
        let state = t.snapshot(s).unwrap();
        assert_eq!(state.total, 1);
        assert_eq!(state.overall.case_study, 1);
    }

    #[test]
    fn sweep_and_reset() {
        let store = StyleStateStore::new();
        let old = SessionId::generate();
        let fresh = SessionId::generate();
        record_n(&tracker_at(&store, fixed_clock()), old, QuestionStyle::Direct, 1);

        let t = tracker_at(&store, Clock::fixed(fixed_now() + Duration::hours(2)));
        record_n(&t, fresh, QuestionStyle::Direct, 1);
        assert_eq!(t.sweep_expired(), 1);
        assert_eq!(store.len(), 1);

        assert!(t.reset(fresh));
        assert!(!t.reset(fresh));
        assert!(store.is_empty());
    }

    #[test]
    fn next_style_follows_the_objective_deficit() {
        let t = tracker_at(&StyleStateStore::new(), fixed_clock());
        let s = SessionId::generate();
        let objective = Objective::new("1.1", 50.0, CognitiveLevel::Knowledge);
        assert_eq!(t.next_style(s, &exam(), &objective), QuestionStyle::Direct);

        record_n(&t, s, QuestionStyle::Direct, 3);
        assert_eq!(t.next_style(s, &exam(), &objective), QuestionStyle::Scenario);
    }

    proptest! {
        #[test]
        fn health_ignores_recording_order(styles in prop::collection::vec(0_usize..3, 1..40)) {
            let forward = StyleStateStore::new();
            let backward = StyleStateStore::new();
            let s = SessionId::generate();
            let tf = tracker_at(&forward, fixed_clock());
            let tb = tracker_at(&backward, fixed_clock());
            for &i in &styles {
                tf.record(s, &exam(), &ObjectiveId::new("1.1"), QuestionStyle::ALL[i]);
            }
            for &i in styles.iter().rev() {
                tb.record(s, &exam(), &ObjectiveId::new("1.1"), QuestionStyle::ALL[i]);
            }
            prop_assert_eq!(tf.health(s, &exam()), tb.health(s, &exam()));
        }
    }
}
