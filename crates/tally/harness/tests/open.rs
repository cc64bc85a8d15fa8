//! Open policy: every identity is always authorized.

use tally_harness::{init_tracing, Simulator};
use tally_types::PolicyConfig;

#[test]
fn counter_increases_by_one() {
    init_tracing();
    let mut sim = Simulator::new();
    let mut deployer = sim.participant();
    let address = sim.deploy(&deployer, PolicyConfig::Open).unwrap();

    sim.increase(&address, &mut deployer, 1).unwrap();

    assert_eq!(sim.counter(&address).unwrap(), 1);
}

#[test]
fn counter_increases_by_arbitrary_numbers() {
    init_tracing();
    let mut sim = Simulator::new();
    let deployer = sim.participant();
    let address = sim.deploy(&deployer, PolicyConfig::Open).unwrap();

    let numbers: [u128; 4] = [1, 2, 10, 42];
    for &value in &numbers {
        // A fresh caller every time; nobody needs permission here.
        let mut caller = sim.participant();
        sim.increase(&address, &mut caller, value).unwrap();
    }

    assert_eq!(sim.counter(&address).unwrap(), numbers.iter().sum::<u128>());
}

#[test]
fn zero_amount_is_accepted_and_changes_nothing() {
    let mut sim = Simulator::new();
    let mut deployer = sim.participant();
    let address = sim.deploy(&deployer, PolicyConfig::Open).unwrap();

    sim.increase(&address, &mut deployer, 10).unwrap();
    let value = sim.increase(&address, &mut deployer, 0).unwrap();

    assert_eq!(value, 10);
    assert_eq!(sim.counter(&address).unwrap(), 10);
}

#[test]
fn snapshots_report_the_open_policy() {
    let mut sim = Simulator::new();
    let deployer = sim.participant();
    let address = sim.deploy(&deployer, PolicyConfig::Open).unwrap();

    let snapshot = sim.snapshot(&address).unwrap();
    assert_eq!(snapshot.counter, 0);
    assert_eq!(
        snapshot.capabilities,
        tally_capability::CapabilitySummary::Open
    );
}
