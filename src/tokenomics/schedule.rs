//! Epoch schedule: maps block time to epochs and emitted reward.

use serde::{Deserialize, Serialize};

use super::{LedgerError, LedgerResult};
use crate::types::{Timestamp, TokenAmount};

/// Epoch parameters set at construction or by the owner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardParams {
    /// Reward released per epoch
    pub reward_per_epoch: TokenAmount,
    /// Epoch length in seconds
    pub epoch_duration: u64,
    /// Seconds at the start of each epoch over which the reward is released
    pub reward_duration: u64,
}

impl RewardParams {
    /// Create validated parameters
    ///
    /// # Errors
    /// Returns `InvalidParameters` if the durations are inconsistent
    pub fn new(
        reward_per_epoch: TokenAmount,
        epoch_duration: u64,
        reward_duration: u64,
    ) -> LedgerResult<Self> {
        let params = Self {
            reward_per_epoch,
            epoch_duration,
            reward_duration,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check `0 < reward_duration <= epoch_duration`
    ///
    /// # Errors
    /// Returns `InvalidParameters` describing the first violated bound
    pub fn validate(&self) -> LedgerResult<()> {
        if self.epoch_duration == 0 {
            return Err(LedgerError::InvalidParameters(
                "epoch duration must be positive".to_string(),
            ));
        }
        if self.reward_duration == 0 {
            return Err(LedgerError::InvalidParameters(
                "reward duration must be positive".to_string(),
            ));
        }
        if self.reward_duration > self.epoch_duration {
            return Err(LedgerError::InvalidParameters(format!(
                "reward duration {} exceeds epoch duration {}",
                self.reward_duration, self.epoch_duration
            )));
        }
        Ok(())
    }
}

/// Epoch clock for one parameter set
///
/// Epoch numbers are serial across parameter changes: a schedule started by
/// `set_parameters` continues counting from `first_epoch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSchedule {
    params: RewardParams,
    start: Timestamp,
    first_epoch: u64,
}

impl EpochSchedule {
    /// Schedule whose epoch `first_epoch` begins at `start`
    #[must_use]
    pub fn new(params: RewardParams, start: Timestamp, first_epoch: u64) -> Self {
        Self {
            params,
            start,
            first_epoch,
        }
    }

    /// Parameters in force
    #[must_use]
    pub fn params(&self) -> &RewardParams {
        &self.params
    }

    /// Time the schedule started
    #[must_use]
    pub fn start(&self) -> Timestamp {
        self.start
    }

    fn elapsed(&self, t: Timestamp) -> u64 {
        t.saturating_sub(self.start)
    }

    /// Epoch number containing `t`
    #[must_use]
    pub fn epoch_at(&self, t: Timestamp) -> u64 {
        self.first_epoch
            .saturating_add(self.elapsed(t) / self.params.epoch_duration)
    }

    /// Start time of the epoch containing `t`
    #[must_use]
    pub fn epoch_start(&self, t: Timestamp) -> Timestamp {
        let d = self.params.epoch_duration;
        self.start + self.elapsed(t) / d * d
    }

    /// Start time of the epoch after the one containing `t`
    #[must_use]
    pub fn next_epoch_at(&self, t: Timestamp) -> Timestamp {
        self.epoch_start(t).saturating_add(self.params.epoch_duration)
    }

    /// Reward emitted from the schedule start up to `t`, in base units
    ///
    /// # Errors
    /// Returns `Overflow` if the total leaves `u128`
    pub fn emitted_until(&self, t: Timestamp) -> LedgerResult<u128> {
        let RewardParams {
            reward_per_epoch,
            epoch_duration,
            reward_duration,
        } = self.params;
        let elapsed = self.elapsed(t);
        let full_epochs = u128::from(elapsed / epoch_duration);
        let into_epoch = (elapsed % epoch_duration).min(reward_duration);

        let full = reward_per_epoch
            .raw()
            .checked_mul(full_epochs)
            .ok_or(LedgerError::Overflow)?;
        let partial = reward_per_epoch
            .raw()
            .checked_mul(u128::from(into_epoch))
            .ok_or(LedgerError::Overflow)?
            / u128::from(reward_duration);

        full.checked_add(partial).ok_or(LedgerError::Overflow)
    }

    /// Reward emitted over `[from, to)`, in base units
    ///
    /// Cumulative emission is floored once, so adjacent intervals add up to
    /// exactly the emission over their union.
    ///
    /// # Errors
    /// Returns `Overflow` if the cumulative emission leaves `u128`
    pub fn emitted_between(&self, from: Timestamp, to: Timestamp) -> LedgerResult<u128> {
        if to <= from {
            return Ok(0);
        }
        Ok(self.emitted_until(to)? - self.emitted_until(from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: u64 = 604_800;

    fn weekly(tokens: u64) -> EpochSchedule {
        let params = RewardParams::new(TokenAmount::from_tokens(tokens), WEEK, WEEK).unwrap();
        EpochSchedule::new(params, 1_000, 0)
    }

    #[test]
    fn test_params_validation() {
        let rpe = TokenAmount::from_tokens(1);
        assert!(RewardParams::new(rpe, WEEK, WEEK).is_ok());
        assert!(RewardParams::new(rpe, WEEK, 1).is_ok());
        assert!(RewardParams::new(rpe, 0, 0).is_err());
        assert!(RewardParams::new(rpe, WEEK, 0).is_err());
        assert!(matches!(
            RewardParams::new(rpe, 10, 11),
            Err(LedgerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_epoch_boundaries() {
        let schedule = weekly(10_000);
        assert_eq!(schedule.epoch_at(1_000), 0);
        assert_eq!(schedule.epoch_at(1_000 + WEEK - 1), 0);
        assert_eq!(schedule.epoch_at(1_000 + WEEK), 1);
        assert_eq!(schedule.epoch_start(1_000 + WEEK + 5), 1_000 + WEEK);
        assert_eq!(schedule.next_epoch_at(1_000 + WEEK + 5), 1_000 + 2 * WEEK);
    }

    #[test]
    fn test_serial_numbering() {
        let params = RewardParams::new(TokenAmount::from_tokens(1), 100, 100).unwrap();
        let schedule = EpochSchedule::new(params, 5_000, 7);
        assert_eq!(schedule.epoch_at(5_000), 7);
        assert_eq!(schedule.epoch_at(5_250), 9);
        // before the start counts as the first epoch
        assert_eq!(schedule.epoch_at(10), 7);
    }

    #[test]
    fn test_linear_emission() {
        let schedule = weekly(10_000);
        let half = schedule.emitted_between(1_000, 1_000 + WEEK / 2).unwrap();
        assert_eq!(half, TokenAmount::from_tokens(5_000).raw());

        let full = schedule.emitted_between(1_000, 1_000 + WEEK).unwrap();
        assert_eq!(full, TokenAmount::from_tokens(10_000).raw());

        let three = schedule.emitted_until(1_000 + 3 * WEEK).unwrap();
        assert_eq!(three, TokenAmount::from_tokens(30_000).raw());
    }

    #[test]
    fn test_emission_stops_after_reward_duration() {
        let params = RewardParams::new(TokenAmount::from_tokens(100), 100, 10).unwrap();
        let schedule = EpochSchedule::new(params, 0, 0);

        assert_eq!(
            schedule.emitted_until(10).unwrap(),
            TokenAmount::from_tokens(100).raw()
        );
        assert_eq!(schedule.emitted_between(10, 100).unwrap(), 0);
        assert_eq!(
            schedule.emitted_between(100, 105).unwrap(),
            TokenAmount::from_tokens(50).raw()
        );
    }

    #[test]
    fn test_intervals_telescope() {
        let params = RewardParams::new(TokenAmount::from_raw(7), 3, 3).unwrap();
        let schedule = EpochSchedule::new(params, 0, 0);
        let pieces: u128 = (0..9)
            .map(|t| schedule.emitted_between(t, t + 1).unwrap())
            .sum();
        assert_eq!(pieces, schedule.emitted_until(9).unwrap());
        assert_eq!(pieces, 21);
        assert_eq!(schedule.emitted_between(5, 2).unwrap(), 0);
    }
}
