//! Modal state the rewriter threads explicitly through each line, instead
//! of smuggling it through instance fields of a god-object.

use crate::geometry::Point;

const NUMERIC_TOLERANCE: f64 = 1e-6;

/// Modal state carried between lines of a single streamed program.
#[derive(Debug, Clone, Default)]
pub struct RewriterState {
    last_g_command: Option<u32>,
    last_explicit_feed: Option<f64>,
    manual_feed_set: bool,
    last_leveling_point: Option<Point>,
    /// Carries a Z-rate-limit split's restored XY feed into a following
    /// XY-only line that has no explicit F of its own.
    xy_rate_carry: bool,
}

impl RewriterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_g_command(&self) -> Option<u32> {
        self.last_g_command
    }

    pub fn set_last_g_command(&mut self, code: u32) {
        self.last_g_command = Some(code);
    }

    pub fn last_explicit_feed(&self) -> Option<f64> {
        self.last_explicit_feed
    }

    pub fn record_explicit_feed(&mut self, feed: f64) {
        self.last_explicit_feed = Some(feed);
        self.manual_feed_set = false;
    }

    pub fn manual_feed_set(&self) -> bool {
        self.manual_feed_set
    }

    pub fn set_manual_feed_set(&mut self, value: bool) {
        self.manual_feed_set = value;
    }

    pub fn last_leveling_point(&self) -> Option<Point> {
        self.last_leveling_point
    }

    pub fn set_last_leveling_point(&mut self, p: Point) {
        self.last_leveling_point = Some(p);
    }

    pub fn xy_rate_carry(&self) -> bool {
        self.xy_rate_carry
    }

    pub fn set_xy_rate_carry(&mut self, value: bool) {
        self.xy_rate_carry = value;
    }

    /// True if `feed` differs from the last explicit feed by more than the
    /// tolerance used elsewhere in the pipeline for float comparisons.
    pub fn feed_changed(&self, feed: f64) -> bool {
        match self.last_explicit_feed {
            Some(last) => (last - feed).abs() > NUMERIC_TOLERANCE,
            None => true,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_no_modal_history() {
        let state = RewriterState::new();
        assert_eq!(state.last_g_command(), None);
        assert_eq!(state.last_explicit_feed(), None);
        assert!(!state.manual_feed_set());
    }

    #[test]
    fn recording_explicit_feed_clears_manual_flag() {
        let mut state = RewriterState::new();
        state.set_manual_feed_set(true);
        state.record_explicit_feed(200.0);
        assert_eq!(state.last_explicit_feed(), Some(200.0));
        assert!(!state.manual_feed_set());
    }

    #[test]
    fn feed_changed_detects_within_tolerance() {
        let mut state = RewriterState::new();
        state.record_explicit_feed(200.0);
        assert!(!state.feed_changed(200.0000001));
        assert!(state.feed_changed(201.0));
    }

    #[test]
    fn reset_clears_all_fields() {
        let mut state = RewriterState::new();
        state.set_last_g_command(1);
        state.record_explicit_feed(100.0);
        state.reset();
        assert_eq!(state.last_g_command(), None);
        assert_eq!(state.last_explicit_feed(), None);
    }
}
