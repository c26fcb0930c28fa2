//! Property tests for reward accounting under random supply, withdraw, claim
//! and wait sequences.

use epoch_rewards::tokenomics::{EpochSchedule, LedgerError, RewardLedger, RewardParams};
use epoch_rewards::types::{Address, TokenAmount};
use proptest::prelude::*;

const WEEK: u64 = 604_800;
const T0: u64 = 1_700_000_000;
const ACCOUNTS: u8 = 4;

fn addr(n: u8) -> Address {
    Address::from_bytes([n + 1; 20])
}

#[derive(Clone, Debug)]
enum Op {
    Supply(u8, u64),
    Withdraw(u8, u64),
    Claim(u8),
    Wait(u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ACCOUNTS, 1u64..10_000).prop_map(|(a, n)| Op::Supply(a, n)),
        (0..ACCOUNTS, 1u64..10_000).prop_map(|(a, n)| Op::Withdraw(a, n)),
        (0..ACCOUNTS).prop_map(Op::Claim),
        (0u64..WEEK).prop_map(Op::Wait),
    ]
}

/// Hourly to weekly epochs, small enough that long waits stay within `u128`
fn arb_params() -> impl Strategy<Value = RewardParams> {
    (1u64..10_000, 3_600u64..=WEEK, 1u64..=100).prop_map(|(reward, epoch, pct)| {
        let release = (epoch * pct / 100).max(1);
        RewardParams {
            reward_per_epoch: TokenAmount::from_tokens(reward),
            epoch_duration: epoch,
            reward_duration: release,
        }
    })
}

/// Apply `op` at `now`; returns the amount claimed, if any
fn apply(ledger: &mut RewardLedger, op: &Op, now: &mut u64) -> Option<TokenAmount> {
    match *op {
        Op::Supply(a, n) => {
            ledger
                .supply(addr(a), TokenAmount::from_tokens(n), *now)
                .unwrap();
        }
        Op::Withdraw(a, n) => {
            let amount = TokenAmount::from_tokens(n).min(ledger.balance_of(&addr(a)));
            if !amount.is_zero() {
                ledger.withdraw(addr(a), amount, *now).unwrap();
            }
        }
        Op::Claim(a) => match ledger.claim(addr(a), *now) {
            Ok(amount) => return Some(amount),
            Err(e) => assert_eq!(e, LedgerError::NothingToClaim),
        },
        Op::Wait(secs) => *now += secs,
    }
    None
}

proptest! {
    #[test]
    fn proptest_reward_monotonic_in_epochs(
        params in arb_params(),
        balance in 1u64..1_000_000,
        epochs in 1u64..20,
    ) {
        let mut ledger = RewardLedger::new(params, T0).unwrap();
        ledger.supply(addr(0), TokenAmount::from_tokens(balance), T0).unwrap();

        let mut previous = TokenAmount::ZERO;
        for n in 0..=epochs {
            let at = T0 + n * params.epoch_duration;
            let available = ledger.available_reward(&addr(0), at).unwrap();
            prop_assert!(available >= previous, "reward fell at epoch {}", n);
            previous = available;
        }
        prop_assert!(!previous.is_zero());
    }

    #[test]
    fn proptest_paid_never_exceeds_emission(
        params in arb_params(),
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let mut ledger = RewardLedger::new(params, T0).unwrap();
        let schedule = EpochSchedule::new(params, T0, 0);
        let mut now = T0;
        let mut paid = 0u128;

        for op in &ops {
            if let Some(amount) = apply(&mut ledger, op, &mut now) {
                paid += amount.raw();
            }
        }

        let data = ledger.data(now).unwrap();
        let emitted = schedule.emitted_until(now).unwrap();
        prop_assert_eq!(
            data.total_distributed.raw() + data.total_undistributed.raw(),
            emitted
        );
        prop_assert_eq!(data.total_claimed.raw(), paid);

        let accounts: Vec<Address> = (0..ACCOUNTS).map(addr).collect();
        let owed: u128 = ledger
            .user_info(&accounts, now)
            .unwrap()
            .iter()
            .map(|info| info.claimable.raw() + info.accruing.raw() + info.claimed_total.raw())
            .sum();
        prop_assert!(owed <= data.total_distributed.raw());
    }

    #[test]
    fn proptest_claims_per_epoch_bounded(
        params in arb_params(),
        balances in prop::collection::vec(1u64..10_000, 1..(ACCOUNTS as usize)),
        epochs in 1u64..10,
    ) {
        let mut ledger = RewardLedger::new(params, T0).unwrap();
        for (i, balance) in balances.iter().enumerate() {
            ledger
                .supply(addr(i as u8), TokenAmount::from_tokens(*balance), T0)
                .unwrap();
        }

        for n in 1..=epochs {
            let at = T0 + n * params.epoch_duration;
            let mut claimed = 0u128;
            for i in 0..balances.len() {
                if let Ok(amount) = ledger.claim(addr(i as u8), at) {
                    claimed += amount.raw();
                }
            }
            prop_assert!(claimed <= params.reward_per_epoch.raw());
        }
    }

    #[test]
    fn proptest_equal_suppliers_equal_shares(
        params in arb_params(),
        participants in 2u8..=ACCOUNTS,
        balance in 1u64..1_000_000,
        epochs in 1u64..5,
    ) {
        let mut ledger = RewardLedger::new(params, T0).unwrap();
        for a in 0..participants {
            ledger.supply(addr(a), TokenAmount::from_tokens(balance), T0).unwrap();
        }

        let at = T0 + epochs * params.epoch_duration;
        let first = ledger.claim(addr(0), at).unwrap();
        prop_assert!(!first.is_zero());
        for a in 1..participants {
            prop_assert_eq!(ledger.claim(addr(a), at).unwrap(), first);
        }
    }

    #[test]
    fn proptest_second_claim_yields_nothing(
        params in arb_params(),
        ops in prop::collection::vec(arb_op(), 1..40),
        who in 0..ACCOUNTS,
    ) {
        let mut ledger = RewardLedger::new(params, T0).unwrap();
        let mut now = T0;
        for op in &ops {
            apply(&mut ledger, op, &mut now);
        }

        let _ = ledger.claim(addr(who), now);
        prop_assert_eq!(ledger.claim(addr(who), now), Err(LedgerError::NothingToClaim));
    }
}
