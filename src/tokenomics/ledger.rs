//! Pro-rata reward ledger.
//!
//! Emission from the [`EpochSchedule`] is shared between participants in
//! proportion to their supplied balance over time, using a reward-per-token
//! accumulator scaled by [`ACC_PRECISION`]. Reward earned inside the current
//! epoch is accruing; it matures when the epoch ends and only matured reward
//! can be claimed.
//!
//! Participants are settled lazily: every operation first advances the
//! accumulator to `now`, then brings the touched participant up to date.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{EpochSchedule, LedgerError, LedgerResult, RewardParams};
use crate::types::{Address, Timestamp, TokenAmount};

/// Fixed-point scale of the reward-per-token accumulator
pub const ACC_PRECISION: u128 = 1_000_000_000_000;

/// Global accrual state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Accumulator {
    schedule: EpochSchedule,
    total_supplied: u128,
    /// Reward per supplied base unit, scaled by `ACC_PRECISION`
    per_token: u128,
    /// `per_token` when the current epoch began
    per_token_at_epoch: u128,
    /// Scaled remainder of the accumulator increments in the current epoch
    dust: u128,
    /// Current epoch
    epoch: u64,
    last_update: Timestamp,
    /// Emission shared between suppliers
    distributed: u128,
    /// Emission while nobody had supplied; stays in the pool
    undistributed: u128,
}

impl Accumulator {
    fn new(params: RewardParams, now: Timestamp) -> Self {
        Self {
            schedule: EpochSchedule::new(params, now, 0),
            total_supplied: 0,
            per_token: 0,
            per_token_at_epoch: 0,
            dust: 0,
            epoch: 0,
            last_update: now,
            distributed: 0,
            undistributed: 0,
        }
    }

    /// Bring the accumulator forward to `now`, splitting at the epoch boundary
    fn advance(&mut self, now: Timestamp) -> LedgerResult<()> {
        let now = now.max(self.last_update);
        let current = self.schedule.epoch_at(now);

        if current > self.epoch {
            let boundary = self.schedule.epoch_start(now);
            self.accrue(self.last_update, boundary)?;
            self.close_epoch()?;
            self.epoch = current;
            self.accrue(boundary, now)?;
        } else {
            self.accrue(self.last_update, now)?;
        }

        self.last_update = now;
        Ok(())
    }

    fn accrue(&mut self, from: Timestamp, to: Timestamp) -> LedgerResult<()> {
        let emitted = self.schedule.emitted_between(from, to)?;
        if emitted == 0 {
            return Ok(());
        }

        if self.total_supplied == 0 {
            self.undistributed = checked_add(self.undistributed, emitted)?;
            return Ok(());
        }

        let scaled = emitted
            .checked_mul(ACC_PRECISION)
            .ok_or(LedgerError::Overflow)?;
        let scaled = checked_add(scaled, self.dust)?;
        self.per_token = checked_add(self.per_token, scaled / self.total_supplied)?;
        self.dust = scaled % self.total_supplied;
        self.distributed = checked_add(self.distributed, emitted)?;
        Ok(())
    }

    /// Snapshot the accumulator at the end of an epoch
    ///
    /// Remainder too small for one accumulator step goes back to the pool,
    /// so reward matured in an epoch never exceeds its emission.
    fn close_epoch(&mut self) -> LedgerResult<()> {
        let leftover = self.dust / ACC_PRECISION;
        self.distributed = self.distributed.saturating_sub(leftover);
        self.undistributed = checked_add(self.undistributed, leftover)?;
        self.dust = 0;
        self.per_token_at_epoch = self.per_token;
        Ok(())
    }

    /// Close the current epoch and start a new schedule at `now`
    ///
    /// Must be called right after `advance(now)`.
    fn restart(&mut self, params: RewardParams, now: Timestamp) -> LedgerResult<()> {
        self.close_epoch()?;
        self.epoch += 1;
        self.schedule = EpochSchedule::new(params, now, self.epoch);
        Ok(())
    }
}

/// Per-participant bookkeeping
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Participant {
    balance: TokenAmount,
    /// Accumulator value the participant was last settled at
    paid: u128,
    /// Epoch the participant was last settled in
    epoch: u64,
    matured: TokenAmount,
    accruing: TokenAmount,
    claimed_total: TokenAmount,
    last_claim: Option<Timestamp>,
}

impl Participant {
    fn joining(acc: &Accumulator) -> Self {
        Self {
            balance: TokenAmount::ZERO,
            paid: acc.per_token,
            epoch: acc.epoch,
            matured: TokenAmount::ZERO,
            accruing: TokenAmount::ZERO,
            claimed_total: TokenAmount::ZERO,
            last_claim: None,
        }
    }

    fn settle(&mut self, acc: &Accumulator) -> LedgerResult<()> {
        let balance = self.balance.raw();

        if self.epoch < acc.epoch {
            // everything up to the start of the current epoch has matured
            let closed = TokenAmount::from_raw(earned(balance, acc.per_token_at_epoch - self.paid)?);
            self.matured = add_amount(add_amount(self.matured, self.accruing)?, closed)?;
            self.accruing = TokenAmount::from_raw(earned(
                balance,
                acc.per_token - acc.per_token_at_epoch,
            )?);
        } else {
            let fresh = TokenAmount::from_raw(earned(balance, acc.per_token - self.paid)?);
            self.accruing = add_amount(self.accruing, fresh)?;
        }

        self.paid = acc.per_token;
        self.epoch = acc.epoch;
        Ok(())
    }

    fn info(&self, account: Address) -> UserInfo {
        UserInfo {
            account,
            balance: self.balance,
            claimable: self.matured,
            accruing: self.accruing,
            claimed_total: self.claimed_total,
            last_claim: self.last_claim,
        }
    }
}

fn earned(balance: u128, per_token_delta: u128) -> LedgerResult<u128> {
    Ok(balance
        .checked_mul(per_token_delta)
        .ok_or(LedgerError::Overflow)?
        / ACC_PRECISION)
}

fn checked_add(a: u128, b: u128) -> LedgerResult<u128> {
    a.checked_add(b).ok_or(LedgerError::Overflow)
}

fn add_amount(a: TokenAmount, b: TokenAmount) -> LedgerResult<TokenAmount> {
    a.checked_add(b).ok_or(LedgerError::Overflow)
}

/// Reward position of one participant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Participant
    pub account: Address,
    /// Supplied balance
    pub balance: TokenAmount,
    /// Matured reward, claimable now
    pub claimable: TokenAmount,
    /// Reward earned in the current epoch
    pub accruing: TokenAmount,
    /// Reward claimed so far
    pub claimed_total: TokenAmount,
    /// Time of the last successful claim
    pub last_claim: Option<Timestamp>,
}

/// Aggregate view of the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerData {
    /// Reward released per epoch
    pub reward_per_epoch: TokenAmount,
    /// Epoch length in seconds
    pub epoch_duration: u64,
    /// Release window at the start of each epoch
    pub reward_duration: u64,
    /// Epoch number at the queried time
    pub current_epoch: u64,
    /// Start of that epoch
    pub epoch_start: Timestamp,
    /// Start of the next epoch
    pub next_epoch_at: Timestamp,
    /// Sum of supplied balances
    pub total_supplied: TokenAmount,
    /// Emission shared between suppliers
    pub total_distributed: TokenAmount,
    /// Emission while nothing was supplied
    pub total_undistributed: TokenAmount,
    /// Reward paid out by claims
    pub total_claimed: TokenAmount,
    /// Participants with a non-zero balance
    pub participants: u64,
}

/// Per-participant reward accounting over epochs
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLedger {
    acc: Accumulator,
    participants: BTreeMap<Address, Participant>,
    total_claimed: TokenAmount,
}

impl RewardLedger {
    /// Start a ledger whose first epoch begins at `now`
    ///
    /// # Errors
    /// Returns `InvalidParameters` if `params` fail validation
    pub fn new(params: RewardParams, now: Timestamp) -> LedgerResult<Self> {
        params.validate()?;
        Ok(Self {
            acc: Accumulator::new(params, now),
            participants: BTreeMap::new(),
            total_claimed: TokenAmount::ZERO,
        })
    }

    /// Parameters in force
    #[must_use]
    pub fn params(&self) -> &RewardParams {
        self.acc.schedule.params()
    }

    /// Sum of supplied balances
    #[must_use]
    pub fn total_supplied(&self) -> TokenAmount {
        TokenAmount::from_raw(self.acc.total_supplied)
    }

    /// Supplied balance of `account`
    #[must_use]
    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.participants
            .get(account)
            .map_or(TokenAmount::ZERO, |p| p.balance)
    }

    fn settle(&mut self, account: Address, now: Timestamp) -> LedgerResult<&mut Participant> {
        self.acc.advance(now)?;
        let acc = &self.acc;
        let participant = self
            .participants
            .entry(account)
            .or_insert_with(|| Participant::joining(acc));
        participant.settle(acc)?;
        Ok(participant)
    }

    /// Record `amount` supplied by `account`
    ///
    /// # Errors
    /// `ZeroAmount` for a zero amount, `Overflow` on arithmetic overflow
    pub fn supply(&mut self, account: Address, amount: TokenAmount, now: Timestamp) -> LedgerResult<()> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let participant = self.settle(account, now)?;
        participant.balance = add_amount(participant.balance, amount)?;
        self.acc.total_supplied = checked_add(self.acc.total_supplied, amount.raw())?;
        Ok(())
    }

    /// Reduce the supplied balance of `account`; earned reward is kept
    ///
    /// # Errors
    /// `ZeroAmount` for a zero amount, `InsufficientBalance` if `amount`
    /// exceeds the balance
    pub fn withdraw(&mut self, account: Address, amount: TokenAmount, now: Timestamp) -> LedgerResult<()> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if self.balance_of(&account) < amount {
            return Err(LedgerError::InsufficientBalance);
        }
        let participant = self.settle(account, now)?;
        participant.balance = participant
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance)?;
        self.acc.total_supplied -= amount.raw();
        Ok(())
    }

    /// Take the matured reward of `account`
    ///
    /// # Errors
    /// `NothingToClaim` if no reward has matured
    pub fn claim(&mut self, account: Address, now: Timestamp) -> LedgerResult<TokenAmount> {
        if !self.participants.contains_key(&account) {
            return Err(LedgerError::NothingToClaim);
        }
        let participant = self.settle(account, now)?;
        let amount = participant.matured;
        if amount.is_zero() {
            return Err(LedgerError::NothingToClaim);
        }

        participant.matured = TokenAmount::ZERO;
        participant.claimed_total = add_amount(participant.claimed_total, amount)?;
        participant.last_claim = Some(now);
        self.total_claimed = add_amount(self.total_claimed, amount)?;
        Ok(amount)
    }

    /// Replace the epoch parameters at `now`
    ///
    /// Accrual up to `now` is settled under the old parameters and matures
    /// immediately; a new epoch starts at `now`.
    ///
    /// # Errors
    /// `InvalidParameters` if `params` fail validation
    pub fn set_parameters(&mut self, params: RewardParams, now: Timestamp) -> LedgerResult<()> {
        params.validate()?;
        self.acc.advance(now)?;
        let now = self.acc.last_update;
        self.acc.restart(params, now)
    }

    fn projected(&self, now: Timestamp) -> LedgerResult<Accumulator> {
        let mut acc = self.acc.clone();
        acc.advance(now)?;
        Ok(acc)
    }

    fn projected_participant(
        &self,
        account: &Address,
        acc: &Accumulator,
    ) -> LedgerResult<Option<Participant>> {
        self.participants
            .get(account)
            .map(|p| {
                let mut p = p.clone();
                p.settle(acc).map(|()| p)
            })
            .transpose()
    }

    /// Reward `account` could claim at `now`
    ///
    /// # Errors
    /// `Overflow` on arithmetic overflow
    pub fn available_reward(&self, account: &Address, now: Timestamp) -> LedgerResult<TokenAmount> {
        let acc = self.projected(now)?;
        Ok(self
            .projected_participant(account, &acc)?
            .map_or(TokenAmount::ZERO, |p| p.matured))
    }

    /// Reward positions of `accounts` at `now`, in the order given
    ///
    /// # Errors
    /// `Overflow` on arithmetic overflow
    pub fn user_info(&self, accounts: &[Address], now: Timestamp) -> LedgerResult<Vec<UserInfo>> {
        let acc = self.projected(now)?;
        accounts
            .iter()
            .map(|account| {
                Ok(self
                    .projected_participant(account, &acc)?
                    .unwrap_or_else(|| Participant::joining(&acc))
                    .info(*account))
            })
            .collect()
    }

    /// Aggregate view at `now`
    ///
    /// # Errors
    /// `Overflow` on arithmetic overflow
    pub fn data(&self, now: Timestamp) -> LedgerResult<LedgerData> {
        let acc = self.projected(now)?;
        let schedule = &acc.schedule;
        let at = acc.last_update;
        let params = schedule.params();

        Ok(LedgerData {
            reward_per_epoch: params.reward_per_epoch,
            epoch_duration: params.epoch_duration,
            reward_duration: params.reward_duration,
            current_epoch: acc.epoch,
            epoch_start: schedule.epoch_start(at),
            next_epoch_at: schedule.next_epoch_at(at),
            total_supplied: TokenAmount::from_raw(acc.total_supplied),
            total_distributed: TokenAmount::from_raw(acc.distributed),
            total_undistributed: TokenAmount::from_raw(acc.undistributed),
            total_claimed: self.total_claimed,
            participants: self
                .participants
                .values()
                .filter(|p| !p.balance.is_zero())
                .count() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: u64 = 604_800;
    const T0: Timestamp = 1_700_000_000;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn tokens(n: u64) -> TokenAmount {
        TokenAmount::from_tokens(n)
    }

    fn weekly_ledger() -> RewardLedger {
        let params = RewardParams::new(tokens(10_000), WEEK, WEEK).unwrap();
        RewardLedger::new(params, T0).unwrap()
    }

    #[test]
    fn test_never_supplied_has_nothing_to_claim() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();
        assert_eq!(
            ledger.claim(addr(9), T0 + WEEK),
            Err(LedgerError::NothingToClaim)
        );
    }

    #[test]
    fn test_equal_suppliers_share_equally() {
        let mut ledger = weekly_ledger();
        for n in 1..=4 {
            ledger.supply(addr(n), tokens(100), T0).unwrap();
        }

        for n in 1..=4 {
            assert_eq!(ledger.claim(addr(n), T0 + WEEK).unwrap(), tokens(2_500));
        }
        assert_eq!(ledger.claim(addr(5), T0 + WEEK), Err(LedgerError::NothingToClaim));
    }

    #[test]
    fn test_second_claim_yields_nothing() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();

        assert_eq!(ledger.claim(addr(1), T0 + WEEK).unwrap(), tokens(10_000));
        assert_eq!(ledger.claim(addr(1), T0 + WEEK), Err(LedgerError::NothingToClaim));
        // later in the same epoch, still nothing matured
        assert_eq!(
            ledger.claim(addr(1), T0 + WEEK + 100),
            Err(LedgerError::NothingToClaim)
        );
    }

    #[test]
    fn test_current_epoch_is_not_claimable() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();

        assert_eq!(ledger.claim(addr(1), T0 + WEEK / 2), Err(LedgerError::NothingToClaim));
        let info = &ledger.user_info(&[addr(1)], T0 + WEEK / 2).unwrap()[0];
        assert_eq!(info.accruing, tokens(5_000));
        assert_eq!(info.claimable, TokenAmount::ZERO);
    }

    #[test]
    fn test_late_joiner_is_time_weighted() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();
        ledger.supply(addr(2), tokens(100), T0 + WEEK / 2).unwrap();

        assert_eq!(ledger.claim(addr(1), T0 + WEEK).unwrap(), tokens(7_500));
        assert_eq!(ledger.claim(addr(2), T0 + WEEK).unwrap(), tokens(2_500));
    }

    #[test]
    fn test_rewards_accumulate_over_epochs() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(50), T0).unwrap();
        ledger.supply(addr(2), tokens(150), T0).unwrap();

        assert_eq!(ledger.available_reward(&addr(1), T0 + 3 * WEEK).unwrap(), tokens(7_500));
        assert_eq!(ledger.claim(addr(2), T0 + 3 * WEEK).unwrap(), tokens(22_500));
    }

    #[test]
    fn test_withdraw_keeps_earned_reward() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();
        ledger.supply(addr(2), tokens(100), T0).unwrap();
        ledger.withdraw(addr(1), tokens(100), T0 + WEEK / 2).unwrap();

        assert_eq!(ledger.balance_of(&addr(1)), TokenAmount::ZERO);
        assert_eq!(ledger.total_supplied(), tokens(100));
        assert_eq!(ledger.claim(addr(1), T0 + WEEK).unwrap(), tokens(2_500));
        assert_eq!(ledger.claim(addr(2), T0 + WEEK).unwrap(), tokens(7_500));
    }

    #[test]
    fn test_withdraw_errors() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(10), T0).unwrap();
        assert_eq!(
            ledger.withdraw(addr(1), tokens(11), T0),
            Err(LedgerError::InsufficientBalance)
        );
        assert_eq!(
            ledger.withdraw(addr(2), tokens(1), T0),
            Err(LedgerError::InsufficientBalance)
        );
        assert_eq!(
            ledger.withdraw(addr(1), TokenAmount::ZERO, T0),
            Err(LedgerError::ZeroAmount)
        );
        assert_eq!(
            ledger.supply(addr(1), TokenAmount::ZERO, T0),
            Err(LedgerError::ZeroAmount)
        );
    }

    #[test]
    fn test_emission_without_suppliers_stays_in_pool() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0 + WEEK / 2).unwrap();

        let data = ledger.data(T0 + WEEK).unwrap();
        assert_eq!(data.total_undistributed, tokens(5_000));
        assert_eq!(data.total_distributed, tokens(5_000));
        assert_eq!(ledger.claim(addr(1), T0 + WEEK).unwrap(), tokens(5_000));
    }

    #[test]
    fn test_set_parameters_matures_current_epoch() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();

        let halved = RewardParams::new(tokens(5_000), WEEK, WEEK).unwrap();
        ledger.set_parameters(halved, T0 + WEEK / 2).unwrap();
        assert_eq!(ledger.params().reward_per_epoch, tokens(5_000));

        // the half epoch before the change is claimable right away
        assert_eq!(ledger.claim(addr(1), T0 + WEEK / 2).unwrap(), tokens(5_000));

        // the new schedule runs one full epoch from the change
        assert_eq!(ledger.claim(addr(1), T0 + WEEK / 2 + WEEK).unwrap(), tokens(5_000));
        assert_eq!(ledger.data(T0 + WEEK / 2 + WEEK).unwrap().current_epoch, 2);
    }

    #[test]
    fn test_set_parameters_rejects_invalid() {
        let mut ledger = weekly_ledger();
        let bad = RewardParams {
            reward_per_epoch: tokens(1),
            epoch_duration: 10,
            reward_duration: 20,
        };
        assert!(matches!(
            ledger.set_parameters(bad, T0),
            Err(LedgerError::InvalidParameters(_))
        ));
        assert_eq!(ledger.params().epoch_duration, WEEK);
    }

    #[test]
    fn test_views_do_not_mutate() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();
        let before = ledger.clone();

        assert_eq!(ledger.available_reward(&addr(1), T0 + WEEK).unwrap(), tokens(10_000));
        let _ = ledger.user_info(&[addr(1), addr(2)], T0 + WEEK).unwrap();
        let _ = ledger.data(T0 + WEEK).unwrap();
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_data_snapshot() {
        let mut ledger = weekly_ledger();
        ledger.supply(addr(1), tokens(100), T0).unwrap();
        ledger.supply(addr(2), tokens(300), T0).unwrap();
        ledger.claim(addr(1), T0 + WEEK).unwrap();

        let data = ledger.data(T0 + WEEK + 10).unwrap();
        assert_eq!(data.reward_per_epoch, tokens(10_000));
        assert_eq!(data.current_epoch, 1);
        assert_eq!(data.epoch_start, T0 + WEEK);
        assert_eq!(data.next_epoch_at, T0 + 2 * WEEK);
        assert_eq!(data.total_supplied, tokens(400));
        assert_eq!(data.total_claimed, tokens(2_500));
        assert_eq!(data.participants, 2);
    }

    #[test]
    fn test_frequent_updates_keep_large_balances_whole() {
        let mut ledger = weekly_ledger();
        let balance = tokens(1_000_000_000);
        for n in 1..=4 {
            ledger.supply(addr(n), balance, T0).unwrap();
        }

        // a one-wei supplier touches the ledger every block
        for t in (T0 + 12..T0 + WEEK).step_by(12) {
            ledger.supply(addr(9), TokenAmount::from_raw(1), t).unwrap();
        }

        let paid: u128 = (1..=4)
            .map(|n| ledger.claim(addr(n), T0 + WEEK).unwrap().raw())
            .sum();
        let data = ledger.data(T0 + WEEK).unwrap();
        assert_eq!(
            data.total_distributed.raw() + data.total_undistributed.raw(),
            tokens(10_000).raw()
        );
        assert!(paid <= data.total_distributed.raw());

        // each participant loses at most one accumulator step
        let per_participant = balance.raw() / ACC_PRECISION + 1;
        assert!(data.total_distributed.raw() - paid <= 4 * per_participant);
    }

    #[test]
    fn test_user_info_for_unknown_account() {
        let ledger = weekly_ledger();
        let info = ledger.user_info(&[addr(7)], T0 + WEEK).unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].account, addr(7));
        assert_eq!(info[0].balance, TokenAmount::ZERO);
        assert_eq!(info[0].last_claim, None);
    }
}
