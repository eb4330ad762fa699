//! Property-based invariants of the turn engine.

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use stellar_core::combat::damage::{apply_hit, WeaponKind};
use stellar_core::combat::ground::{GroundCombat, GroundForces};
use stellar_core::combat::space::{BattleEnd, Combatant, SpaceBattle, SpaceCombatResolver};
use stellar_core::prelude::*;
use stellar_core::system::{BASE_STORAGE, BASE_TROOP_CAPACITY, MAX_MORALE};
use stellar_core::turn::chunk::partition_rows;
use stellar_test_utils::determinism::verify_galaxy_determinism;
use stellar_test_utils::fixtures::strategies::{arb_design, arb_hull, arb_tech};
use stellar_test_utils::fixtures::{spawn_designs, two_empires, GalaxyBuilder, ShipDesign};

fn arb_weapon() -> impl Strategy<Value = WeaponKind> {
    prop_oneof![Just(WeaponKind::Beam), Just(WeaponKind::Torpedo)]
}

/// Warships whose beams always wear down the target eventually.
fn arb_warship() -> impl Strategy<Value = ShipDesign> {
    let component = prop_oneof![
        (20.0..80.0f64).prop_map(|damage| Component::BeamEmitter { damage }),
        (0.0..100.0f64).prop_map(|amount| Component::ArmorPlating { amount }),
        (0.0..100.0f64).prop_map(|amount| Component::ShieldGenerator { amount }),
        (0..200u32).prop_map(|strength| Component::SensorArray { strength }),
    ];
    (arb_hull(), proptest::collection::vec(component, 0..5))
        .prop_map(|(hull, components)| ShipDesign::new("Warship", hull, components))
}

proptest! {
    /// Every row lands in exactly one chunk, and chunk sizes differ by at most one.
    #[test]
    fn prop_partition_covers_rows(height in 0u32..200, parts in 1usize..16) {
        let ranges = partition_rows(height, parts);
        prop_assert_eq!(ranges.len(), parts);
        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            next = range.end;
        }
        prop_assert_eq!(next, height);

        let sizes: Vec<u32> = ranges.iter().map(|r| r.end - r.start).collect();
        let max = sizes.iter().max().copied().unwrap_or(0);
        let min = sizes.iter().min().copied().unwrap_or(0);
        prop_assert!(max - min <= 1);
    }

    /// Clamping puts every pool into `[0, max]`.
    #[test]
    fn prop_clamp_bounds_pools(
        design in arb_design(),
        tech in arb_tech(),
        hull in -1_000.0..2_000.0f64,
        armor in -1_000.0..2_000.0f64,
        shield in -1_000.0..2_000.0f64,
        fuel in -1_000.0..2_000.0f64,
    ) {
        let mut ship = design.build(ShipId(1), &tech);
        ship.hull = hull;
        ship.armor = armor;
        ship.shield = shield;
        ship.deuterium = fuel;
        let stats = ship.stats(&tech);
        ship.clamp_to(&stats);

        prop_assert!((0.0..=stats.max_hull).contains(&ship.hull));
        prop_assert!((0.0..=stats.max_armor).contains(&ship.armor));
        prop_assert!((0.0..=stats.max_shield).contains(&ship.shield));
        prop_assert!((0.0..=stats.max_deuterium).contains(&ship.deuterium));
    }

    /// Ground combat ends with one side wiped out, one trooper lost per round.
    #[test]
    fn prop_ground_combat_terminates(
        attackers in 0u32..60,
        defenders in 0u32..60,
        attack in 0.0..5.0f64,
        defend in 0.0..5.0f64,
        seed in any::<u64>(),
    ) {
        let combat = GroundCombat::new(
            GroundForces { troops: attackers, strength: attack },
            GroundForces { troops: defenders, strength: defend },
        );
        let outcome = combat.resolve(&mut ChaCha8Rng::seed_from_u64(seed));

        prop_assert_eq!(outcome.attacker_losses + outcome.defender_losses, outcome.rounds);
        if outcome.attacker_won {
            prop_assert_eq!(outcome.defender_losses, defenders);
            prop_assert!(outcome.attacker_losses < attackers);
        } else {
            prop_assert_eq!(outcome.attacker_losses, attackers);
        }
    }

    /// Shields and armor never go negative; zero damage changes nothing.
    #[test]
    fn prop_damage_cascade_bounds(
        weapon in arb_weapon(),
        damage in 0.0..500.0f64,
        shield in 0.0..200.0f64,
        armor in 0.0..200.0f64,
    ) {
        let mut ship = Ship::new(ShipId(1), "Target", HullClass::Destroyer, vec![], &TechLevels::default());
        ship.shield = shield;
        ship.armor = armor;
        let before = ship.clone();

        let dealt = apply_hit(&mut ship, weapon, damage);
        prop_assert!(ship.shield >= 0.0);
        prop_assert!(ship.armor >= 0.0);
        prop_assert!(ship.hull <= before.hull);
        prop_assert!(dealt.shield >= 0.0 && dealt.armor >= 0.0 && dealt.hull >= 0.0);

        let mut untouched = before.clone();
        apply_hit(&mut untouched, weapon, 0.0);
        prop_assert_eq!(untouched, before);
    }

    /// Space combat between any two rosters stops without hitting the round cap.
    #[test]
    fn prop_space_combat_terminates(
        side_a in proptest::collection::vec(arb_warship(), 1..4),
        side_b in proptest::collection::vec(arb_warship(), 1..4),
        seed in any::<u64>(),
    ) {
        let mut battle = SpaceBattle::new(GridPos::new(0, 0));
        let tech = TechLevels::default();
        let mut id = 0;
        for (owner, side) in [(UserId(1), &side_a), (UserId(2), &side_b)] {
            for design in side {
                id += 1;
                battle.add(Combatant::new(FleetId(u64::from(owner.0)), owner, design.build(ShipId(id), &tech), tech));
            }
        }

        let summary = SpaceCombatResolver::new(10_000).resolve(&mut battle, &mut ChaCha8Rng::seed_from_u64(seed));
        prop_assert_ne!(summary.end, BattleEnd::RoundCap);
        prop_assert!(battle.combatants().iter().all(|c| !c.ship.is_destroyed()));
    }

    /// System stores and morale stay within their capacities under any adjustment.
    #[test]
    fn prop_system_stores_stay_bounded(
        deltas in proptest::collection::vec((-5_000i64..5_000, -500i64..500, -200i64..200), 1..20),
    ) {
        let mut system = StarSystem::new(GridPos::new(0, 0), "Test", SystemKind::Star);
        for (stock, troops, morale) in deltas {
            system.add_ore(stock);
            system.add_deuterium(-stock);
            system.add_troops(troops);
            system.adjust_morale(morale);

            prop_assert!(system.ore() <= BASE_STORAGE);
            prop_assert!(system.deuterium() <= BASE_STORAGE);
            prop_assert!(system.troops() <= BASE_TROOP_CAPACITY);
            prop_assert!(system.morale() <= MAX_MORALE);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// A full turn with a damaged fleet at home leaves all pools within bounds.
    #[test]
    fn prop_turn_keeps_fleet_pools_bounded(
        design in arb_design(),
        hull_share in 0.01..1.0f64,
        armor_share in 0.0..1.0f64,
        seed in any::<u64>(),
    ) {
        let home = GridPos::new(1, 1);
        let (mut galaxy, users) = GalaxyBuilder::new(3, 3)
            .seed(seed)
            .empire("Ada", Faction::Terran, home)
            .build()
            .unwrap();
        let fleet = spawn_designs(&mut galaxy, users[0], "Test", home, &[design]).unwrap();
        let tech = galaxy.user(users[0]).unwrap().tech;
        {
            let ship = &mut galaxy.fleet_mut(fleet).unwrap().ships_mut()[0];
            let stats = ship.stats(&tech);
            ship.hull = stats.max_hull * hull_share;
            ship.armor = stats.max_armor * armor_share;
        }

        let executor = TurnExecutor::new(EngineConfig { worker_count: 1, ..EngineConfig::default() }).unwrap();
        executor.execute_turn(&mut galaxy).unwrap();

        if let Ok(fleet) = galaxy.fleet(fleet) {
            for ship in fleet.ships() {
                let stats = ship.stats(&tech);
                prop_assert!((0.0..=stats.max_hull).contains(&ship.hull));
                prop_assert!((0.0..=stats.max_armor).contains(&ship.armor));
                prop_assert!((0.0..=stats.max_shield).contains(&ship.shield));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(4))]

    /// Same seed, same setup, same worker count: same galaxy after several turns.
    #[test]
    fn prop_turns_are_replayable(seed in any::<u64>(), workers in 1usize..5) {
        let config = EngineConfig { worker_count: workers, ..EngineConfig::default() };
        let result = verify_galaxy_determinism(|| two_empires(seed).unwrap().0, 5, &config).unwrap();
        prop_assert!(result.is_deterministic, "hashes diverged: {:?}", result.hashes);
    }
}
