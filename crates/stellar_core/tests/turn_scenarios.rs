//! End-to-end turn tests.
//!
//! These drive whole turns through [`TurnExecutor`] and check the externally
//! observable results: galaxy state and user reports.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use stellar_core::combat::ground::{GroundCombat, GroundForces};
use stellar_core::combat::space::{SpaceBattle, SpaceCombatResolver};
use stellar_core::prelude::*;
use stellar_test_utils::fixtures::{spawn_designs, GalaxyBuilder, ShipDesign};

fn executor() -> TurnExecutor {
    TurnExecutor::new(EngineConfig {
        worker_count: 3,
        ..EngineConfig::default()
    })
    .unwrap()
}

fn has_report(galaxy: &Galaxy, user: UserId, pred: impl Fn(&TurnReportItem) -> bool) -> bool {
    galaxy
        .user(user)
        .unwrap()
        .reports()
        .iter()
        .any(|entry| pred(&entry.item))
}

// =============================================================================
// Economy
// =============================================================================

mod economy {
    use super::*;

    /// Food +40, morale 50: one pass raises morale to 51 and grows population.
    #[test]
    fn test_food_surplus_grows_colony() {
        let mut galaxy = Galaxy::new(5, 5, 11);
        let user = galaxy.add_user("Ada", Faction::Terran);
        let pos = GridPos::new(2, 2);
        galaxy.set_system_owner(pos, user).unwrap();

        let system = galaxy.system_mut(pos).unwrap();
        system.kind = SystemKind::Star;
        let mut planet = Planet::new("Terra", PlanetKind::Terran, 1_000, 8);
        planet.set_population(200);
        system.planets.push(planet);
        for slot in 0..3 {
            system.build_structure(0, slot, StructureKind::Farm).unwrap();
        }
        system.build_structure(0, 3, StructureKind::PowerPlant).unwrap();
        assert_eq!(system.economy().food, 40);
        assert_eq!(system.morale(), 50);

        executor().execute_turn(&mut galaxy).unwrap();

        let system = galaxy.system(pos).unwrap();
        assert_eq!(system.morale(), 51);
        assert!(system.planets[0].population() > 200);
        assert!(!has_report(&galaxy, user, |item| matches!(
            item,
            TurnReportItem::Starvation { .. }
        )));
    }

    /// Empty fleet tanks at a stocked, powered home system refuel from the stockpile.
    #[test]
    fn test_refuel_moves_deuterium_from_stockpile() {
        let mut galaxy = Galaxy::new(3, 3, 5);
        let user = galaxy.add_user("Ada", Faction::Terran);
        let pos = GridPos::new(1, 1);
        galaxy.set_system_owner(pos, user).unwrap();

        let system = galaxy.system_mut(pos).unwrap();
        system.kind = SystemKind::Star;
        system.planets.push(Planet::new("Depot", PlanetKind::Barren, 0, 4));
        system.build_structure(0, 0, StructureKind::PowerPlant).unwrap();
        system.build_structure(0, 1, StructureKind::Factory).unwrap();
        system.set_deuterium(500);
        assert!(system.economy().power > 0);

        let tanker = ShipDesign::new(
            "Tanker",
            HullClass::Transport,
            vec![Component::FuelTank { capacity: 400.0 }],
        );
        let fleet = spawn_designs(&mut galaxy, user, "Convoy", pos, &[tanker]).unwrap();
        let max_fuel = {
            let tech = galaxy.user(user).unwrap().tech;
            let ship = &mut galaxy.fleet_mut(fleet).unwrap().ships_mut()[0];
            ship.deuterium = 0.0;
            ship.stats(&tech).max_deuterium
        };
        assert!(max_fuel > 500.0);

        executor().execute_turn(&mut galaxy).unwrap();

        let refuelled = galaxy.fleet(fleet).unwrap().ships()[0].deuterium;
        assert_eq!(refuelled, max_fuel.min(500.0));
        assert_eq!(galaxy.system(pos).unwrap().deuterium(), 0);
    }

    #[test]
    fn test_research_raises_tech_level() {
        let (mut galaxy, users) = GalaxyBuilder::new(4, 4)
            .empire("Ada", Faction::Terran, GridPos::new(1, 1))
            .build()
            .unwrap();
        let user = galaxy.user_mut(users[0]).unwrap();
        user.research_target = Some(TechField::Weapons);
        user.research_points = 95;

        executor().execute_turn(&mut galaxy).unwrap();

        let user = galaxy.user(users[0]).unwrap();
        assert_eq!(user.tech.get(TechField::Weapons), 1);
        assert!(user.research_target.is_none());
        assert!(has_report(&galaxy, users[0], |item| matches!(
            item,
            TurnReportItem::TechnologyGranted {
                field: TechField::Weapons,
                level: 1
            }
        )));
    }

    #[test]
    fn test_completed_ship_is_commissioned() {
        let home = GridPos::new(1, 1);
        let (mut galaxy, users) = GalaxyBuilder::new(4, 4)
            .empire("Ada", Faction::Terran, home)
            .build()
            .unwrap();
        galaxy
            .enqueue_build(
                home,
                BuildKind::Ship {
                    hull: HullClass::Scout,
                    components: vec![],
                    name: "Swift".into(),
                },
            )
            .unwrap();

        let executor = executor();
        for _ in 0..HullClass::Scout.build_turns() {
            executor.execute_turn(&mut galaxy).unwrap();
        }

        let user = galaxy.user(users[0]).unwrap();
        assert_eq!(user.fleets.len(), 1);
        let fleet = galaxy.fleet(user.fleets[0]).unwrap();
        assert_eq!(fleet.position, home);
        assert_eq!(fleet.ships()[0].name, "Swift");
        assert!(galaxy.system(home).unwrap().build_queue.is_empty());
    }
}

// =============================================================================
// Orders
// =============================================================================

mod orders {
    use super::*;

    #[test]
    fn test_colonize_claims_system_and_consumes_ship() {
        let (mut galaxy, users) = GalaxyBuilder::new(5, 5)
            .empire("Ada", Faction::Terran, GridPos::new(0, 0))
            .build()
            .unwrap();
        let target = GridPos::new(3, 3);
        let system = galaxy.system_mut(target).unwrap();
        system.kind = SystemKind::Star;
        system.planets.push(Planet::new("Eden", PlanetKind::Ocean, 500, 6));

        let fleet = spawn_designs(&mut galaxy, users[0], "Settlers", target, &[ShipDesign::colony_ship()]).unwrap();
        galaxy
            .set_order(fleet, Order::new(OrderKind::Colonize { planet: 0 }))
            .unwrap();

        executor().execute_turn(&mut galaxy).unwrap();

        let system = galaxy.system(target).unwrap();
        assert_eq!(system.owner, users[0]);
        assert!(system.planets[0].population() > 0);
        assert!(galaxy.fleet(fleet).is_err());
        assert!(galaxy.user(users[0]).unwrap().systems.contains(&target));
    }

    #[test]
    fn test_mining_fills_hold_from_field() {
        let field = GridPos::new(2, 0);
        let (mut galaxy, users) = GalaxyBuilder::new(4, 4)
            .empire("Ada", Faction::Terran, GridPos::new(0, 3))
            .asteroid_field(field, 1_000)
            .build()
            .unwrap();
        let fleet = spawn_designs(&mut galaxy, users[0], "Diggers", field, &[ShipDesign::miner()]).unwrap();
        galaxy.set_order(fleet, Order::new(OrderKind::Mine)).unwrap();

        executor().execute_turn(&mut galaxy).unwrap();

        let mined = galaxy.fleet(fleet).unwrap().cargo_ore();
        assert!(mined > 0);
        assert_eq!(galaxy.system(field).unwrap().resources_left, 1_000 - mined);
    }

    #[test]
    fn test_invasion_transfers_ownership() {
        let enemy_home = GridPos::new(4, 4);
        let (mut galaxy, users) = GalaxyBuilder::new(5, 5)
            .empire("Ada", Faction::Terran, GridPos::new(0, 0))
            .empire("Brin", Faction::Kragg, enemy_home)
            .build()
            .unwrap();
        let fleet = spawn_designs(
            &mut galaxy,
            users[0],
            "Legion",
            enemy_home,
            &[ShipDesign::troop_transport(200)],
        )
        .unwrap();
        galaxy.fleet_mut(fleet).unwrap().ships_mut()[0].troops = 200;
        galaxy.set_order(fleet, Order::new(OrderKind::Invade)).unwrap();

        executor().execute_turn(&mut galaxy).unwrap();

        let system = galaxy.system(enemy_home).unwrap();
        assert_eq!(system.owner, users[0]);
        assert_eq!(system.morale(), 25);
        assert!(system.troops() > 0);
        for user in &users {
            assert!(has_report(&galaxy, *user, |item| matches!(
                item,
                TurnReportItem::Invasion {
                    attacker_won: true,
                    ..
                }
            )));
        }
    }

    #[test]
    fn test_invasion_keeps_surplus_troops_aboard() {
        let enemy_home = GridPos::new(4, 4);
        let (mut galaxy, users) = GalaxyBuilder::new(5, 5)
            .empire("Ada", Faction::Terran, GridPos::new(0, 0))
            .empire("Brin", Faction::Kragg, enemy_home)
            .build()
            .unwrap();
        galaxy.system_mut(enemy_home).unwrap().set_troops(1);
        let fleet = spawn_designs(
            &mut galaxy,
            users[0],
            "Legion",
            enemy_home,
            &[ShipDesign::troop_transport(200)],
        )
        .unwrap();
        galaxy.fleet_mut(fleet).unwrap().ships_mut()[0].troops = 100;
        galaxy.set_order(fleet, Order::new(OrderKind::Invade)).unwrap();

        executor().execute_turn(&mut galaxy).unwrap();

        let system = galaxy.system(enemy_home).unwrap();
        let capacity = system.troop_capacity();
        assert!(capacity < 100);
        assert_eq!(system.owner, users[0]);
        assert_eq!(system.troops(), capacity);

        let aboard = galaxy.fleet(fleet).unwrap().troops();
        let user = galaxy.user(users[0]).unwrap();
        let losses = user
            .reports()
            .iter()
            .find_map(|entry| match entry.item {
                TurnReportItem::Invasion { attacker_losses, .. } => Some(attacker_losses),
                _ => None,
            })
            .unwrap();
        assert_eq!(system.troops() + aboard + losses, 100);
    }

    #[test]
    fn test_invalid_order_rejected_at_issuance() {
        let (mut galaxy, users) = GalaxyBuilder::new(4, 4)
            .empire("Ada", Faction::Terran, GridPos::new(0, 0))
            .fleet(0, "Guard", vec![ShipDesign::scout()])
            .build()
            .unwrap();
        let fleet = galaxy.user(users[0]).unwrap().fleets[0];
        let err = galaxy.set_order(fleet, Order::new(OrderKind::Invade)).unwrap_err();
        assert!(matches!(err, GameError::InvalidOrder(_)));
        assert!(galaxy.fleet(fleet).unwrap().order.is_none());
    }
}

// =============================================================================
// Combat
// =============================================================================

mod combat {
    use super::*;

    /// Strength 3.0 against 1.0 wins more than 90% of invasions.
    #[test]
    fn test_ground_odds_favor_stronger_side() {
        let combat = GroundCombat::new(
            GroundForces {
                troops: 10,
                strength: 3.0,
            },
            GroundForces {
                troops: 10,
                strength: 1.0,
            },
        );
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let forecast = combat.simulate(1_000, &mut rng);
        assert_eq!(forecast.runs, 1_000);
        assert!(forecast.win_rate() > 0.9, "win rate {}", forecast.win_rate());
    }

    /// A single beam of 100 against an unprotected 50-hull target destroys it.
    #[test]
    fn test_single_beam_kills_unprotected_target() {
        let mut galaxy = Galaxy::new(3, 3, 8);
        let ada = galaxy.add_user("Ada", Faction::Terran);
        let brin = galaxy.add_user("Brin", Faction::Zenthari);
        let pos = GridPos::new(1, 1);

        let gunship = ShipDesign::new(
            "Gunship",
            HullClass::Cruiser,
            vec![
                Component::BeamEmitter { damage: 100.0 },
                Component::SensorArray { strength: 200 },
            ],
        );
        let hulk = ShipDesign::new("Hulk", HullClass::Battleship, vec![]);
        spawn_designs(&mut galaxy, ada, "Hunters", pos, &[gunship]).unwrap();
        let prey = spawn_designs(&mut galaxy, brin, "Prey", pos, &[hulk]).unwrap();
        galaxy.fleet_mut(prey).unwrap().ships_mut()[0].hull = 50.0;

        let mut battle = SpaceBattle::gather(&galaxy, pos).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        SpaceCombatResolver::new(1_000).resolve(&mut battle, &mut rng);

        assert_eq!(battle.combatants().len(), 1);
        assert_eq!(battle.combatants()[0].owner, ada);
        assert_eq!(battle.tally(ada).enemies_destroyed, 1);

        battle.apply(&mut galaxy).unwrap();
        assert!(galaxy.fleet(prey).is_err());
        assert!(has_report(&galaxy, ada, |item| matches!(
            item,
            TurnReportItem::Battle(BattleReport {
                enemies_destroyed: 1,
                ..
            })
        )));
        assert!(has_report(&galaxy, brin, |item| matches!(
            item,
            TurnReportItem::Battle(BattleReport { ships_lost: 1, .. })
        )));
    }

    /// Without sensors a single beam of 100 still kills an unprotected
    /// 50-hull target whenever it connects.
    #[test]
    fn test_single_beam_kills_unprotected_target_without_sensors() {
        let mut kills = 0;
        for seed in 0..20 {
            let mut galaxy = Galaxy::new(3, 3, 8);
            let ada = galaxy.add_user("Ada", Faction::Terran);
            let brin = galaxy.add_user("Brin", Faction::Zenthari);
            let pos = GridPos::new(1, 1);

            let gunship = ShipDesign::new(
                "Gunship",
                HullClass::Cruiser,
                vec![Component::BeamEmitter { damage: 100.0 }],
            );
            let hulk = ShipDesign::new("Hulk", HullClass::Battleship, vec![]);
            spawn_designs(&mut galaxy, ada, "Hunters", pos, &[gunship]).unwrap();
            let prey = spawn_designs(&mut galaxy, brin, "Prey", pos, &[hulk]).unwrap();
            galaxy.fleet_mut(prey).unwrap().ships_mut()[0].hull = 50.0;

            let mut battle = SpaceBattle::gather(&galaxy, pos).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let summary = SpaceCombatResolver::new(1_000).resolve(&mut battle, &mut rng);

            assert!(summary.hits <= 1, "seed {seed}: {summary:?}");
            if summary.hits == 1 {
                kills += 1;
                assert_eq!(battle.tally(ada).enemies_destroyed, 1);
                assert_eq!(battle.combatants().len(), 1);
                battle.apply(&mut galaxy).unwrap();
                assert!(galaxy.fleet(prey).is_err());
            } else {
                assert_eq!(battle.tally(brin).ships_lost, 0);
            }
        }
        assert!(kills >= 15, "only {kills} of 20 battles ended in a kill");
    }

    #[test]
    fn test_orphaned_fleet_does_not_stall_turns() {
        let pos = GridPos::new(2, 2);
        let mut galaxy = Galaxy::new(5, 5, 13);
        let ada = galaxy.add_user("Ada", Faction::Terran);
        let brin = galaxy.add_user("Brin", Faction::Kragg);
        spawn_designs(&mut galaxy, ada, "Patrol", pos, &[ShipDesign::torpedo_frigate()]).unwrap();
        let orphan = spawn_designs(&mut galaxy, brin, "Raiders", pos, &[ShipDesign::torpedo_frigate()]).unwrap();
        galaxy.fleet_mut(orphan).unwrap().owner = UserId(99);

        let executor = executor();
        for expected in 1..=3 {
            let summary = executor.execute_turn(&mut galaxy).unwrap();
            assert_eq!(summary.turn, expected);
        }
        assert_eq!(galaxy.turn(), 3);
        assert!(!galaxy.is_turn_in_progress());
    }

    #[test]
    fn test_orphaned_invasion_order_is_dropped() {
        let enemy_home = GridPos::new(4, 4);
        let (mut galaxy, users) = GalaxyBuilder::new(5, 5)
            .empire("Ada", Faction::Terran, GridPos::new(0, 0))
            .empire("Brin", Faction::Kragg, enemy_home)
            .build()
            .unwrap();
        let fleet = spawn_designs(
            &mut galaxy,
            users[0],
            "Legion",
            enemy_home,
            &[ShipDesign::troop_transport(200)],
        )
        .unwrap();
        galaxy.fleet_mut(fleet).unwrap().ships_mut()[0].troops = 200;
        galaxy.set_order(fleet, Order::new(OrderKind::Invade)).unwrap();
        galaxy.fleet_mut(fleet).unwrap().owner = UserId(99);

        executor().execute_turn(&mut galaxy).unwrap();

        assert_eq!(galaxy.turn(), 1);
        assert!(galaxy.fleet(fleet).unwrap().order.is_none());
        assert_eq!(galaxy.system(enemy_home).unwrap().owner, users[1]);
    }

    #[test]
    fn test_turn_fights_battle_between_fleets() {
        let pos = GridPos::new(2, 2);
        let mut galaxy = Galaxy::new(5, 5, 21);
        let ada = galaxy.add_user("Ada", Faction::Terran);
        let brin = galaxy.add_user("Brin", Faction::Kragg);
        spawn_designs(&mut galaxy, ada, "Hunters", pos, &[ShipDesign::beam_cruiser()]).unwrap();
        spawn_designs(&mut galaxy, brin, "Patrol", pos, &[ShipDesign::torpedo_frigate()]).unwrap();

        let summary = executor().execute_turn(&mut galaxy).unwrap();
        assert_eq!(summary.battles, 1);
        assert!(has_report(&galaxy, ada, |item| matches!(item, TurnReportItem::Battle(_))));
        assert!(has_report(&galaxy, brin, |item| matches!(item, TurnReportItem::Battle(_))));
    }
}

// =============================================================================
// Turn lifecycle
// =============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_turn_increments_once_per_call() {
        let (mut galaxy, _) = GalaxyBuilder::new(6, 6)
            .seed(3)
            .empire("Ada", Faction::Terran, GridPos::new(1, 1))
            .build()
            .unwrap();
        let executor = executor();
        for expected in 1..=5 {
            assert!(!galaxy.is_turn_in_progress());
            let summary = executor.execute_turn(&mut galaxy).unwrap();
            assert_eq!(summary.turn, expected);
            assert_eq!(galaxy.turn(), expected);
            assert!(!galaxy.is_turn_in_progress());
        }
    }

    #[test]
    fn test_phase_one_failure_still_advances_turn() {
        let mut galaxy = Galaxy::new(6, 6, 3);
        let system = galaxy.system_mut(GridPos::new(5, 5)).unwrap();
        system.kind = SystemKind::Star;
        system.owner = UserId(99);

        let summary = executor().execute_turn(&mut galaxy).unwrap();
        assert_eq!(summary.phase_one_failures, 1);
        assert_eq!(galaxy.turn(), 1);
        assert!(!galaxy.is_turn_in_progress());
    }

    #[test]
    fn test_move_and_empty_fleet_cleanup() {
        let (mut galaxy, users) = GalaxyBuilder::new(6, 6)
            .empire("Ada", Faction::Terran, GridPos::new(0, 0))
            .fleet(0, "Recon", vec![ShipDesign::scout()])
            .build()
            .unwrap();
        let fleet = galaxy.user(users[0]).unwrap().fleets[0];
        let destination = GridPos::new(0, 2);
        galaxy
            .set_order(fleet, Order::new(OrderKind::MoveTo { destination }))
            .unwrap();

        let executor = executor();
        executor.execute_turn(&mut galaxy).unwrap();
        executor.execute_turn(&mut galaxy).unwrap();
        assert_eq!(galaxy.fleet(fleet).unwrap().position, destination);
        assert!(galaxy.system(destination).unwrap().fleets.contains(&fleet));
        assert!(!galaxy.system(GridPos::new(0, 0)).unwrap().fleets.contains(&fleet));

        galaxy.fleet_mut(fleet).unwrap().ships_mut()[0].hull = 0.0;
        executor.execute_turn(&mut galaxy).unwrap();
        assert!(galaxy.fleet(fleet).is_err());
        assert!(galaxy.user(users[0]).unwrap().fleets.is_empty());
        assert!(galaxy.system(destination).unwrap().fleets.is_empty());
        galaxy.check_invariants().unwrap();
    }

    #[test]
    fn test_snapshot_round_trip_preserves_hash() {
        let (mut galaxy, _) = stellar_test_utils::fixtures::two_empires(5).unwrap();
        executor().execute_turn(&mut galaxy).unwrap();
        let restored = Galaxy::deserialize(&galaxy.serialize().unwrap()).unwrap();
        assert_eq!(restored.state_hash(), galaxy.state_hash());
        assert_eq!(restored.turn(), 1);
    }
}
