//! Cross-variant properties, driven by proptest.

use proptest::prelude::*;
use tally_harness::Simulator;
use tally_types::{DenialReason, PolicyConfig};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn open_counter_is_the_sum_of_all_amounts(
        amounts in proptest::collection::vec(0u128..1_000_000, 0..24),
    ) {
        let mut sim = Simulator::new();
        let deployer = sim.participant();
        let address = sim.deploy(&deployer, PolicyConfig::Open).unwrap();

        for &amount in &amounts {
            let mut caller = sim.participant();
            sim.increase(&address, &mut caller, amount).unwrap();
        }

        prop_assert_eq!(
            sim.counter(&address).unwrap(),
            amounts.iter().sum::<u128>()
        );
    }

    #[test]
    fn one_time_grantees_succeed_exactly_once(
        attempts in proptest::collection::vec((0u128..1_000, 1usize..4), 1..8),
    ) {
        let mut sim = Simulator::new();
        let deployer = sim.participant();
        let address = sim.deploy(&deployer, PolicyConfig::OneTime).unwrap();

        let mut expected = 0u128;
        for &(amount, tries) in &attempts {
            let mut grantee = sim.participant();
            sim.grant(&address, &deployer, &grantee).unwrap();

            let mut successes = 0;
            for _ in 0..tries {
                match sim.increase(&address, &mut grantee, amount) {
                    Ok(_) => successes += 1,
                    Err(err) => {
                        prop_assert_eq!(err.denial(), Some(DenialReason::AlreadyUsed));
                    }
                }
            }
            prop_assert_eq!(successes, 1);
            expected += amount;
        }

        prop_assert_eq!(sim.counter(&address).unwrap(), expected);
    }

    #[test]
    fn denied_calls_never_mutate_state(
        amounts in proptest::collection::vec(0u128..1_000, 1..8),
    ) {
        let mut sim = Simulator::new();
        let deployer = sim.participant();
        let mut stranger = sim.participant();
        let address = sim.deploy(&deployer, PolicyConfig::PermitList).unwrap();

        let before = sim.snapshot(&address).unwrap();
        for &amount in &amounts {
            let err = sim.increase(&address, &mut stranger, amount).unwrap_err();
            prop_assert_eq!(err.denial(), Some(DenialReason::NotPermitted));
        }

        prop_assert_eq!(sim.snapshot(&address).unwrap(), before);
    }

    #[test]
    fn token_counter_counts_only_token_backed_calls(
        purchases in proptest::collection::vec(0u128..1_000, 0..8),
        freeloaders in 0usize..4,
    ) {
        const PRICE: u128 = 100;

        let mut sim = Simulator::new();
        let deployer = sim.participant();
        let address = sim
            .deploy(&deployer, PolicyConfig::Token { price: PRICE })
            .unwrap();

        for &amount in &purchases {
            let mut buyer = sim.funded_participant(PRICE);
            sim.buy_permission(&address, &mut buyer, PRICE).unwrap();
            sim.increase(&address, &mut buyer, amount).unwrap();
        }
        for _ in 0..freeloaders {
            let mut freeloader = sim.participant();
            let err = sim.increase(&address, &mut freeloader, 1).unwrap_err();
            prop_assert_eq!(err.denial(), Some(DenialReason::NoValidToken));
        }

        prop_assert_eq!(
            sim.counter(&address).unwrap(),
            purchases.iter().sum::<u128>()
        );
    }
}
