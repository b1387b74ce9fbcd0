//! Integration tests for the filUSD liquidation engine.
//!
//! These tests drive complete journeys through the public surface: borrowers
//! open and adjust Troves, the price moves, liquidations settle against the
//! stability pool or redistribute, and depositors withdraw what is left.

use filusd::core::borrower;
use filusd::core::config::EngineParams;
use filusd::core::trove::TroveStatus;
use filusd::liquidation::engine::LiquidationEngine;
use filusd::oracle::price_feed::PriceFeed;
use filusd::system::SystemState;
use filusd::utils::address::Address;
use filusd::utils::constants::DECIMAL_PRECISION;

const FIL: u128 = DECIMAL_PRECISION;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn addr(byte: u8) -> Address {
    Address::from_slice(&[byte; 20]).unwrap()
}

fn feed(price: u128) -> PriceFeed {
    PriceFeed::with_price(price).unwrap()
}

fn open(state: &mut SystemState, oracle: &PriceFeed, byte: u8, coll_fil: u128, debt_fusd: u128) {
    borrower::open_trove(
        state,
        oracle,
        addr(byte),
        coll_fil * FIL,
        debt_fusd * FIL,
        None,
    )
    .unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// FULL JOURNEYS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_open_crash_liquidate_claim_journey() {
    let mut state = SystemState::new(EngineParams::default()).unwrap();
    let mut oracle = feed(400 * FIL);

    // Step 1: three borrowers, one deep-pocketed survivor
    open(&mut state, &oracle, 1, 10, 1_800);
    open(&mut state, &oracle, 2, 12, 2_200);
    open(&mut state, &oracle, 3, 100, 2_000);

    // Step 2: a depositor backs the stability pool
    state.stability_pool.provide(addr(10), 5_000 * FIL).unwrap();

    // Step 3: FIL crashes from $400 to $210; troves 1 and 2 both land at
    // ICR 1.05, trove 3 stays far above water
    oracle.set_price(210 * FIL).unwrap();
    let mut engine = LiquidationEngine::new();
    let totals = engine
        .liquidate_troves(&mut state, &oracle, 10, addr(99))
        .unwrap();

    assert_eq!(totals.troves_liquidated, 2);
    assert_eq!(totals.total_debt_liquidated, 4_000 * FIL);
    assert_eq!(totals.total_debt_offset, 4_000 * FIL);
    assert_eq!(totals.total_debt_redistributed, 0);
    // 0.5% of 12 and 10 FIL respectively
    assert_eq!(totals.total_gas_compensation, 110_000_000_000_000_000);
    assert_eq!(
        totals.total_collateral_offset,
        21_890_000_000_000_000_000
    );

    // both events carry the same ICR; the riskier-keyed trove walks first
    let events = engine.recent_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].owner, addr(2));
    assert_eq!(events[1].owner, addr(1));
    assert_eq!(events[0].icr, 1_050_000_000_000_000_000);
    assert_eq!(events[1].icr, 1_050_000_000_000_000_000);

    // Step 4: the closed troves are terminal, the survivor is untouched
    assert_eq!(
        state.ledger.trove(&addr(1)).unwrap().status,
        TroveStatus::ClosedByLiquidation
    );
    assert_eq!(
        state.ledger.trove(&addr(2)).unwrap().status,
        TroveStatus::ClosedByLiquidation
    );
    assert_eq!(state.ledger.active_trove_count(), 1);
    assert_eq!(state.ledger.active_pool().collateral, 100 * FIL);
    assert_eq!(state.ledger.active_pool().debt, 2_000 * FIL);
    assert_eq!(state.ledger.default_pool().debt, 0);

    // Step 5: the depositor exits with the liquidated collateral; the
    // round-up on the loss per unit strands a few wei of deposit dust
    let (withdrawn, gain) = state
        .stability_pool
        .withdraw(&addr(10), u128::MAX)
        .unwrap();
    assert_eq!(withdrawn, 999_999_999_999_999_995_000);
    assert_eq!(gain, 21_890_000_000_000_000_000);
    assert_eq!(state.stability_pool.total_debt_token_deposits(), 5_000);
    assert_eq!(state.stability_pool.collateral_balance(), 0);
    assert_eq!(state.stability_pool.depositor_count(), 0);

    assert!(state.verify_invariants().is_ok());
}

#[test]
fn test_redistribution_cascade_and_rescue() {
    let mut state = SystemState::new(EngineParams::default()).unwrap();
    let mut oracle = feed(400 * FIL);

    open(&mut state, &oracle, 1, 10, 1_800);
    open(&mut state, &oracle, 2, 20, 3_800);
    open(&mut state, &oracle, 3, 30, 3_000);

    // no stability pool: everything redistributes
    let mut engine = LiquidationEngine::new();
    oracle.set_price(210 * FIL).unwrap();
    let totals = engine
        .liquidate(&mut state, &oracle, &addr(1), addr(99))
        .unwrap();

    assert_eq!(totals.total_debt_redistributed, 1_800 * FIL);
    assert_eq!(
        totals.total_collateral_redistributed,
        9_950_000_000_000_000_000
    );

    // stakes are 20 and 30, so the rewards split 2:3
    let two = state.ledger.entire_position(&addr(2)).unwrap();
    assert_eq!(two.pending_debt, 720 * FIL);
    assert_eq!(two.pending_collateral, 3_980_000_000_000_000_000);
    let three = state.ledger.entire_position(&addr(3)).unwrap();
    assert_eq!(three.pending_debt, 1_080 * FIL);
    assert_eq!(three.pending_collateral, 5_970_000_000_000_000_000);

    // Step 2: borrower 2 absorbed enough debt to be next in line; topping
    // up rescues it, and a liquidation attempt is then a clean no-op
    borrower::add_collateral(&mut state, &addr(2), 2 * FIL, None, None).unwrap();
    let rescued = engine
        .liquidate(&mut state, &oracle, &addr(2), addr(99))
        .unwrap();
    assert_eq!(rescued.troves_liquidated, 0);
    assert!(state.ledger.trove(&addr(2)).unwrap().is_active());

    // Step 3: a deeper crash takes borrower 2 down anyway, cascading the
    // absorbed debt onward to the last survivor
    oracle.set_price(180 * FIL).unwrap();
    let totals = engine
        .liquidate(&mut state, &oracle, &addr(2), addr(99))
        .unwrap();

    assert_eq!(totals.total_debt_liquidated, 4_520 * FIL);
    // 25.98 FIL of entire collateral, 0.5% to the caller
    assert_eq!(totals.total_gas_compensation, 129_900_000_000_000_000);
    assert_eq!(
        totals.total_collateral_redistributed,
        25_850_100_000_000_000_000
    );

    // survivor's entire position carries the whole history, modulo the
    // truncation dust the error feedback holds back for the next round
    let last = state.ledger.entire_position(&addr(3)).unwrap();
    assert_eq!(last.debt, 8_599_999_999_999_999_999_980);
    assert_eq!(last.collateral, 61_820_100_000_000_000_000);

    // nothing ever left the system except the two compensations
    assert_eq!(state.entire_system_debt(), 8_600 * FIL);
    assert_eq!(
        state.entire_system_collateral(),
        61_820_100_000_000_000_000
    );

    let stats = engine.statistics();
    assert_eq!(stats.total_troves_liquidated, 2);
    assert_eq!(stats.total_debt_liquidated, 6_320 * FIL);
    assert_eq!(stats.total_debt_offset, 0);
    assert!(state.verify_invariants().is_ok());
}

#[test]
fn test_pool_drains_mid_batch_then_redistributes() {
    let mut state = SystemState::new(EngineParams::default()).unwrap();
    let mut oracle = feed(400 * FIL);

    open(&mut state, &oracle, 1, 10, 1_800);
    open(&mut state, &oracle, 2, 10, 1_900);
    open(&mut state, &oracle, 3, 100, 2_000);
    state.stability_pool.provide(addr(10), 2_500 * FIL).unwrap();

    // at $210 trove 2 sits at ICR 1.0 and walks first, then trove 1 at
    // 1.05; the pool covers 1,900 + 600 before running dry
    oracle.set_price(210 * FIL).unwrap();
    let mut engine = LiquidationEngine::new();
    let totals = engine
        .liquidate_troves(&mut state, &oracle, 10, addr(99))
        .unwrap();

    assert_eq!(totals.troves_liquidated, 2);
    assert_eq!(totals.total_debt_offset, 2_500 * FIL);
    assert_eq!(totals.total_debt_redistributed, 1_200 * FIL);
    assert_eq!(
        totals.total_collateral_offset,
        13_266_666_666_666_666_666
    );
    assert_eq!(
        totals.total_collateral_redistributed,
        6_633_333_333_333_333_334
    );

    let events = engine.recent_events();
    assert_eq!(events[0].owner, addr(2));
    assert_eq!(events[0].debt_offset, 1_900 * FIL);
    assert_eq!(events[0].debt_redistributed, 0);
    assert_eq!(events[1].owner, addr(1));
    assert_eq!(events[1].debt_offset, 600 * FIL);
    assert_eq!(events[1].debt_redistributed, 1_200 * FIL);

    // the emptied pool advanced an epoch; the deposit is consumed but its
    // gain survives, short the per-unit truncation dust
    assert_eq!(state.stability_pool.total_debt_token_deposits(), 0);
    assert_eq!(state.stability_pool.statistics().current_epoch, 1);
    assert_eq!(state.stability_pool.compounded_deposit(&addr(10)).unwrap(), 0);

    let claimed = state.stability_pool.claim_collateral(&addr(10)).unwrap();
    assert_eq!(claimed, 13_266_666_666_666_665_000);
    assert_eq!(state.stability_pool.collateral_balance(), 1_666);
    assert_eq!(state.stability_pool.depositor_count(), 0);

    // the survivor carries the redistributed remainder as pending rewards
    assert!(state.ledger.has_pending_rewards(&addr(3)));
    let survivor = state.ledger.entire_position(&addr(3)).unwrap();
    assert_eq!(survivor.pending_debt, 1_200 * FIL);
    assert_eq!(survivor.pending_collateral, 6_633_333_333_333_333_300);

    assert_eq!(state.ledger.active_pool().collateral, 100 * FIL);
    assert_eq!(state.ledger.active_pool().debt, 2_000 * FIL);
    assert!(state.verify_invariants().is_ok());
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETERMINISM
// ═══════════════════════════════════════════════════════════════════════════════

/// A fixed sequence of operations, used to compare replicas
fn crash_and_recover() -> (SystemState, LiquidationEngine) {
    let mut state = SystemState::new(EngineParams::default()).unwrap();
    let mut oracle = feed(400 * FIL);

    open(&mut state, &oracle, 1, 10, 1_800);
    open(&mut state, &oracle, 2, 14, 2_600);
    open(&mut state, &oracle, 3, 40, 5_000);
    open(&mut state, &oracle, 4, 120, 3_000);
    state.stability_pool.provide(addr(50), 4_000 * FIL).unwrap();

    borrower::borrow(&mut state, &oracle, &addr(3), 200 * FIL, None, None).unwrap();
    borrower::add_collateral(&mut state, &addr(2), FIL, None, None).unwrap();

    oracle.set_price(210 * FIL).unwrap();
    let mut engine = LiquidationEngine::new();
    engine
        .liquidate_troves(&mut state, &oracle, 10, addr(99))
        .unwrap();
    state.stability_pool.withdraw(&addr(50), u128::MAX).unwrap();

    (state, engine)
}

#[test]
fn test_identical_histories_produce_identical_digests() {
    let (state_a, engine_a) = crash_and_recover();
    let (state_b, engine_b) = crash_and_recover();

    assert_eq!(state_a.digest(), state_b.digest());
    assert_eq!(
        engine_a.to_bytes().unwrap(),
        engine_b.to_bytes().unwrap()
    );
}

#[test]
fn test_snapshot_restore_then_diverge_identically() {
    let (mut live, _) = crash_and_recover();
    let mut restored = SystemState::from_bytes(&live.to_bytes().unwrap()).unwrap();
    assert_eq!(live.digest(), restored.digest());

    // both replicas take the same next step and stay in lockstep
    let oracle = feed(210 * FIL);
    for state in [&mut live, &mut restored] {
        borrower::open_trove(state, &oracle, addr(5), 30 * FIL, 2_000 * FIL, None).unwrap();
    }
    assert_eq!(live.digest(), restored.digest());
    assert!(live.verify_invariants().is_ok());
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAKES AFTER LIQUIDATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_trove_opened_after_liquidation_gets_snapshot_scaled_stake() {
    let mut state = SystemState::new(EngineParams::default()).unwrap();
    let mut oracle = feed(400 * FIL);

    open(&mut state, &oracle, 1, 10, 1_800);
    open(&mut state, &oracle, 2, 10, 1_800);

    oracle.set_price(210 * FIL).unwrap();
    let mut engine = LiquidationEngine::new();
    engine
        .liquidate(&mut state, &oracle, &addr(1), addr(99))
        .unwrap();

    // snapshot: 10 FIL of stakes against 19.95 FIL of collateral (the
    // compensation left the system, the redistribution did not)
    oracle.set_price(400 * FIL).unwrap();
    open(&mut state, &oracle, 3, 20, 1_800);

    let newcomer = state.ledger.trove(&addr(3)).unwrap();
    assert_eq!(newcomer.collateral, 20 * FIL);
    // 20 * 10 / 19.95, truncated
    assert_eq!(newcomer.stake, 10_025_062_656_641_604_010);
    assert!(newcomer.stake < newcomer.collateral);
    assert_eq!(
        state.ledger.total_stakes(),
        10 * FIL + 10_025_062_656_641_604_010
    );
    assert!(state.verify_invariants().is_ok());
}
