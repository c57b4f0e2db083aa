//! Timed hint reveal and round-end logic.
//!
//! A room keeps a single pending wake-up (`next_hint_at`), always the earlier of
//! the next scheduled step and the round deadline. The coordinator sleeps until
//! that instant and then calls [`Room::on_wake`].

use crate::state::{
    room::{Room, secs_to_ms},
    state_machine::{RoundEndReason, RoundStatus},
};

/// What a wake-up did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// No round is running.
    Idle,
    /// Fired before the scheduled instant; nothing changed.
    Early,
    /// One more hint became visible.
    HintRevealed,
    /// The final hint is visible and the grace period started.
    GraceStarted,
    /// The round stopped.
    RoundEnded(RoundEndReason),
}

impl Room {
    /// Epoch millis at which the running round hits its hard limit.
    pub fn round_deadline(&self) -> Option<i64> {
        self.round_start_time
            .map(|start| start + secs_to_ms(self.round_duration_sec))
    }

    /// Record the next wake-up, capped at the round deadline.
    pub(crate) fn schedule_wake(&mut self, at: i64) {
        let at = match self.round_deadline() {
            Some(deadline) => at.min(deadline),
            None => at,
        };
        self.next_hint_at = Some(at);
    }

    /// Instant the coordinator should wake at, if a round is running.
    pub fn next_wake_at(&self) -> Option<i64> {
        if self.status != RoundStatus::Playing {
            return None;
        }
        self.next_hint_at.or_else(|| self.round_deadline())
    }

    /// End the round if its deadline has passed. Returns whether it ended.
    pub fn reconcile_timeout(&mut self, now: i64) -> bool {
        if self.status != RoundStatus::Playing {
            return false;
        }
        match self.round_deadline() {
            Some(deadline) if now >= deadline => self.end_round(RoundEndReason::Deadline),
            _ => false,
        }
    }

    /// Advance the round after its scheduled wake-up.
    pub fn on_wake(&mut self, now: i64) -> WakeOutcome {
        if self.reconcile_timeout(now) {
            return WakeOutcome::RoundEnded(RoundEndReason::Deadline);
        }
        if self.status != RoundStatus::Playing {
            return WakeOutcome::Idle;
        }
        let Some(total_hints) = self.current_person.as_ref().map(|p| p.hints.len() as u32) else {
            return WakeOutcome::Idle;
        };
        if self.next_hint_at.is_some_and(|at| now < at) {
            return WakeOutcome::Early;
        }

        if let Some(revealed_at) = self.last_hint_revealed_at {
            let grace_end = revealed_at + secs_to_ms(self.round_end_delay_sec);
            if now >= grace_end {
                self.end_round(RoundEndReason::HintsExhausted);
                return WakeOutcome::RoundEnded(RoundEndReason::HintsExhausted);
            }
            self.schedule_wake(grace_end);
            return WakeOutcome::Early;
        }

        if self.visible_hints < total_hints {
            self.visible_hints += 1;
        }
        if self.visible_hints >= total_hints {
            self.last_hint_revealed_at = Some(now);
            self.schedule_wake(now + secs_to_ms(self.round_end_delay_sec));
            WakeOutcome::GraceStarted
        } else {
            self.schedule_wake(now + secs_to_ms(self.hint_interval_sec));
            WakeOutcome::HintRevealed
        }
    }
}
