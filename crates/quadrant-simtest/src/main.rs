//! Quadrant Headless Simulation Harness
//!
//! Runs scripted scenarios against the engine end-to-end.
//! Runs entirely in-process: no rendering, no input, no files written.
//!
//! Usage:
//!   cargo run -p quadrant-simtest
//!   cargo run -p quadrant-simtest -- --verbose
//!   cargo run -p quadrant-simtest -- --debug

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use hecs::Entity;
use quadrant_core::motion::{KinematicMotion, MotionExecutor, ScriptedMotion};
use quadrant_core::prelude::*;
use quadrant_core::systems::{seconds, ClockEventController, Owner, PendingCallEvent};
use quadrant_logic::constants::{categories, MAX_NAVIGATION_ATTEMPTS};
use quadrant_logic::level::LevelData;

// ── Colony level (embedded) ─────────────────────────────────────────────
const LEVEL_JSON: &str = include_str!("../../../data/colony_level.json");

// ── Logging ─────────────────────────────────────────────────────────────

struct StdoutLogger;

impl log::Log for StdoutLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            println!("    [{:5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn init_logging(level: log::LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "--debug");
    init_logging(if args.iter().any(|a| a == "--debug") {
        log::LevelFilter::Debug
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    });
    println!("=== Quadrant Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Level data validation
    let (level_results, level) = validate_level(verbose);
    results.extend(level_results);

    if let Some(level) = level {
        // 2. Quadrant disable / enable timing
        results.extend(validate_graph_toggles(&level, verbose));

        // 3. Navigation retries
        results.extend(validate_navigation(&level, verbose));

        // 4. Clock events
        results.extend(validate_clock_events(&level, verbose));

        // 5. Behavior state machine
        results.extend(validate_behavior(&level, verbose));

        // 6. Long soak run
        results.extend(validate_soak(&level, verbose));
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn quiet_config() -> SimConfig {
    SimConfig {
        trigger_chance: 0.0,
        seed: 42,
        ..Default::default()
    }
}

fn calls_only(chance: f32) -> ClockEventController {
    let mut clock = ClockEventController::new(chance);
    clock.register(PendingCallEvent {
        wait: seconds(30.0),
    });
    clock
}

fn run_for(sim: &mut Simulation, total_seconds: f32, step: f32) -> FrameReport {
    let mut sum = FrameReport::default();
    let frames = (total_seconds / step).round() as u32;
    for _ in 0..frames {
        let r = sim.update(step);
        sum.timers_fired += r.timers_fired;
        sum.clock_ticks += r.clock_ticks;
        sum.events_applied += r.events_applied;
        sum.arrivals += r.arrivals;
        sum.wanders_started += r.wanders_started;
        sum.deaths += r.deaths;
        sum.notifications += r.notifications;
    }
    sum
}

// ── 1. Level Data ───────────────────────────────────────────────────────

fn validate_level(verbose: bool) -> (Vec<TestResult>, Option<LevelData>) {
    println!("--- Level Data ---");
    let mut results = Vec::new();

    let level: LevelData = match serde_json::from_str(LEVEL_JSON) {
        Ok(l) => l,
        Err(e) => {
            results.push(check("level_parse", false, format!("JSON parse error: {}", e)));
            return (results, None);
        }
    };

    results.push(check(
        "level_not_empty",
        level.waypoints.len() >= 9 && !level.edges.is_empty(),
        format!("{} waypoints, {} edges", level.waypoints.len(), level.edges.len()),
    ));

    let graph = match level.build_graph(false) {
        Ok(g) => g,
        Err(e) => {
            results.push(check("level_builds", false, e.to_string()));
            return (results, None);
        }
    };
    results.push(check(
        "level_builds",
        graph.edge_count() == level.edges.len(),
        format!("{} undirected edges", graph.edge_count()),
    ));

    results.push(check(
        "level_directed_builds",
        level.build_graph(true).is_ok(),
        "directed build accepted",
    ));

    let lanes = level.waypoints.iter().filter(|w| w.camera_lane.is_some()).count();
    results.push(check(
        "level_camera_lanes",
        lanes > 0,
        format!("{} waypoints carry a camera lane", lanes),
    ));

    let keys: Vec<_> = graph.nodes().collect();
    let unreachable: Vec<_> = keys
        .iter()
        .filter(|&&k| k != keys[0] && quadrant_logic::pathfinding::find_route(&graph, keys[0], k).is_none())
        .collect();
    results.push(check(
        "level_connected",
        unreachable.is_empty(),
        if unreachable.is_empty() {
            "every waypoint reachable from the first".to_string()
        } else {
            format!("unreachable: {:?}", unreachable)
        },
    ));

    if verbose {
        println!("  Outgoing edges per waypoint:");
        for k in &keys {
            println!("    {:2}: {}", k, graph.outgoing(*k).count());
        }
    }

    (results, Some(level))
}

// ── 2. Graph Toggles ────────────────────────────────────────────────────

fn validate_graph_toggles(level: &LevelData, _verbose: bool) -> Vec<TestResult> {
    println!("--- Quadrant Toggles ---");
    let mut results = Vec::new();

    let mut sim = match Simulation::new(level, quiet_config()) {
        Ok(s) => s,
        Err(e) => return vec![check("toggle_setup", false, e.to_string())],
    };
    let original = sim.mapper().matrix();

    sim.disable_quadrant(4, 3.0, false);
    run_for(&mut sim, 2.9, 0.1);
    results.push(check(
        "toggle_waits_for_delay",
        sim.is_traversable(4, 1),
        "edges open before the delay elapses",
    ));

    run_for(&mut sim, 0.2, 0.1);
    let blocked = [1, 3, 5, 7].iter().all(|&n| !sim.is_traversable(4, n) && !sim.is_traversable(n, 4));
    results.push(check(
        "toggle_disables_symmetric",
        blocked,
        "all four edges of quadrant 4 blocked in both directions",
    ));

    let detour = sim.route(3, 5);
    results.push(check(
        "toggle_route_detours",
        detour.as_ref().is_some_and(|r| !r.contains(&4)),
        format!("route 3 -> 5: {:?}", detour),
    ));

    results.push(check(
        "toggle_neighbors_untouched",
        sim.is_traversable(0, 1) && sim.is_traversable(7, 8),
        "edges away from quadrant 4 stay open",
    ));

    run_for(&mut sim, 3.0, 0.1);
    results.push(check(
        "toggle_reenables_after_same_delay",
        sim.mapper().matrix() == original,
        "graph restored to its original traversability",
    ));

    // permanent disable isolates the spur waypoint for good
    sim.disable_quadrant(9, 1.0, true);
    run_for(&mut sim, 60.0, 0.5);
    results.push(check(
        "toggle_permanent_stays",
        sim.route(0, 9).is_none(),
        "waypoint 9 unreachable after a permanent disable",
    ));

    // overlapping holds on neighbouring quadrants
    sim.disable_quadrant(1, 2.0, false);
    sim.disable_quadrant(2, 0.5, false);
    run_for(&mut sim, 2.0, 0.5);
    let held = !sim.is_traversable(1, 2);
    run_for(&mut sim, 2.0, 0.5);
    results.push(check(
        "toggle_overlap_no_cross_enable",
        held && sim.is_traversable(1, 2) && sim.is_traversable(2, 5),
        "shared edge held until every disable holding it lifts",
    ));

    sim.attach_event(4, WaypointEvent::hazard("coolant leak"), 1.0);
    sim.attach_event(4, WaypointEvent::pickup("medkit"), 2.0);
    sim.detach_event(4, 3.0);
    run_for(&mut sim, 2.0, 0.5);
    let current = sim.mapper().event_at(4).map(|e| e.label.clone());
    run_for(&mut sim, 1.0, 0.5);
    results.push(check(
        "toggle_event_last_write_wins",
        current.as_deref() == Some("medkit") && sim.mapper().event_at(4).is_none(),
        format!("event before detach: {:?}", current),
    ));

    results
}

// ── 3. Navigation ───────────────────────────────────────────────────────

fn validate_navigation(level: &LevelData, _verbose: bool) -> Vec<TestResult> {
    println!("--- Navigation ---");
    let mut results = Vec::new();

    let mut sim = match Simulation::new(level, quiet_config()) {
        Ok(s) => s,
        Err(e) => return vec![check("nav_setup", false, e.to_string())],
    };

    let (motion, probe) = ScriptedMotion::new(3);
    let agent = sim.spawn_agent(AgentSpawn::new("Retry", motion).in_quadrant(0));
    let accepted = sim.navigate_to(agent, 8);
    results.push(check(
        "nav_retry_then_accept",
        accepted && probe.attempts() == 4 && sim.current_quadrant(agent) == Some(8),
        format!(
            "accepted={} attempts={} quadrant={:?}",
            accepted,
            probe.attempts(),
            sim.current_quadrant(agent)
        ),
    ));

    let (motion, probe) = ScriptedMotion::new(u32::MAX);
    let stuck = sim.spawn_agent(AgentSpawn::new("Stuck", motion).in_quadrant(0));
    let accepted = sim.navigate_to(stuck, 8);
    results.push(check(
        "nav_bounded_retries",
        !accepted && probe.attempts() == MAX_NAVIGATION_ATTEMPTS && sim.current_quadrant(stuck) == Some(0),
        format!("gave up after {} attempts", probe.attempts()),
    ));

    results.push(check(
        "nav_unknown_waypoint",
        !sim.navigate_to(agent, 99),
        "navigation to an unknown waypoint refused",
    ));

    // a kinematic walker actually reaches waypoint 9
    let start = sim.mapper().position_of(5).unwrap_or(Vec3::ZERO);
    let walker = sim.spawn_agent(AgentSpawn::new("Walker", KinematicMotion::new(start, 10.0)).in_quadrant(5));
    sim.navigate_to(walker, 9);
    let mut arrived_at = None;
    for frame in 0..200 {
        if sim.update(0.1).arrivals > 0 && sim.behavior_state(walker) == Some(BehaviorState::Idle) {
            arrived_at = Some(frame);
            break;
        }
    }
    let gap = sim
        .world
        .get::<&Motion>(walker)
        .ok()
        .zip(sim.mapper().position_of(9))
        .map(|(m, target)| m.0.position().distance(&target));
    results.push(check(
        "nav_kinematic_arrival",
        arrived_at.is_some() && gap.is_some_and(|d| d <= sim.config().stopping_range + 1e-3),
        format!("arrived at frame {:?}, {:.2} units from target", arrived_at, gap.unwrap_or(f32::NAN)),
    ));

    let evading = sim.spawn_agent(AgentSpawn::new("Evader", KinematicMotion::new(start, 10.0)).in_quadrant(5));
    results.push(check(
        "nav_evade_quadrant",
        sim.evade_quadrant(evading, 4) && sim.behavior_state(evading) == Some(BehaviorState::Fleeing),
        "agent flees away from quadrant 4",
    ));

    results
}

// ── 4. Clock Events ─────────────────────────────────────────────────────

fn validate_clock_events(level: &LevelData, verbose: bool) -> Vec<TestResult> {
    println!("--- Clock Events ---");
    let mut results = Vec::new();

    let config = SimConfig {
        trigger_chance: 100.0,
        seed: 42,
        ..Default::default()
    };
    let mut sim = match Simulation::new(level, config) {
        Ok(s) => s.with_clock(calls_only(100.0)),
        Err(e) => return vec![check("clock_setup", false, e.to_string())],
    };

    let feed: Rc<RefCell<BTreeMap<String, u32>>> = Rc::default();
    let sink = Rc::clone(&feed);
    sim.subscribe(move |n| *sink.borrow_mut().entry(n.category.clone()).or_insert(0) += 1);

    let agents: Vec<Entity> = (0..3)
        .map(|i| {
            let (motion, _probe) = ScriptedMotion::new(0);
            sim.spawn_agent(AgentSpawn::new(format!("Caller {i}"), motion))
        })
        .collect();

    run_for(&mut sim, 5.0, 0.5);
    let first: Vec<_> = agents
        .iter()
        .map(|&a| sim.event_count(a, categories::PENDING_CALLS))
        .collect();
    results.push(check(
        "clock_certain_trigger",
        first.iter().all(|c| *c == Some(1)),
        format!("markers after first tick: {:?}", first),
    ));

    let second = sim.update(5.0);
    let after: Vec<_> = agents
        .iter()
        .map(|&a| sim.event_count(a, categories::PENDING_CALLS))
        .collect();
    results.push(check(
        "clock_idempotent_guard",
        second.events_applied == 0 && after == first,
        format!("applied on second tick: {}", second.events_applied),
    ));

    sim.answer_pending_call(agents[0]);
    run_for(&mut sim, 25.0, 0.5);
    let missed: Vec<_> = agents
        .iter()
        .map(|&a| sim.event_count(a, categories::MISSED_CALLS))
        .collect();
    results.push(check(
        "clock_missed_calls",
        missed == vec![None, Some(1), Some(1)],
        format!("missed-call markers: {:?}", missed),
    ));

    results.push(check(
        "clock_listeners_notified",
        feed.borrow().get(categories::MISSED_CALLS) == Some(&2),
        format!("{:?}", feed.borrow()),
    ));

    sim.kill(agents[1]);
    let before = sim.event_count(agents[1], categories::PENDING_CALLS);
    run_for(&mut sim, 30.0, 0.5);
    results.push(check(
        "clock_skips_dead",
        sim.event_count(agents[1], categories::PENDING_CALLS) == before
            && sim.scheduler().pending_for(Owner::Events(agents[1])) == 0,
        "dead caller receives no further events",
    ));

    if verbose {
        for (category, count) in feed.borrow().iter() {
            println!("    {:16} {}", category, count);
        }
    }

    results
}

// ── 5. Behavior ─────────────────────────────────────────────────────────

fn validate_behavior(level: &LevelData, _verbose: bool) -> Vec<TestResult> {
    println!("--- Behavior ---");
    let mut results = Vec::new();

    let mut sim = match Simulation::new(level, quiet_config()) {
        Ok(s) => s,
        Err(e) => return vec![check("behavior_setup", false, e.to_string())],
    };

    // wander self-loop, then a chase target suppresses it
    let (motion, probe) = ScriptedMotion::new(0);
    let hunter = sim.spawn_agent(AgentSpawn::new("Hunter", motion).in_quadrant(4));
    let (motion, _prey_probe) = ScriptedMotion::new(0);
    let prey = sim.spawn_agent(AgentSpawn::new("Prey", motion).in_quadrant(0));
    sim.freeze(prey);

    probe.set_remaining(40.0);
    sim.update(0.1);
    probe.set_remaining(0.0);
    let looped = sim.update(0.1).wanders_started == 1;
    results.push(check(
        "behavior_wander_self_loop",
        looped && sim.behavior_state(hunter) == Some(BehaviorState::Wandering),
        "arrival re-enters wandering without a chase target",
    ));

    probe.set_remaining(40.0);
    sim.set_chase_target(hunter, Some(prey));
    sim.update(0.1);
    probe.set_remaining(0.0);
    let report = sim.update(0.1);
    results.push(check(
        "behavior_chase_suppresses_wander",
        report.wanders_started == 0 && sim.behavior_state(hunter) == Some(BehaviorState::Idle),
        format!("state after arrival: {:?}", sim.behavior_state(hunter)),
    ));
    sim.set_chase_target(hunter, None);

    // paying respects holds the governor past arrival
    let (motion, probe) = ScriptedMotion::new(0);
    let mourner = sim.spawn_agent(AgentSpawn::new("Mourner", motion).in_quadrant(6));
    let grave = sim.mapper().position_of(7).unwrap_or(Vec3::ZERO);
    sim.pay_respects(mourner, grave);
    probe.set_remaining(0.0);
    sim.update(0.1);
    let holding = sim.behavior_state(mourner) == Some(BehaviorState::Idle);
    run_for(&mut sim, 30.0, 0.5);
    results.push(check(
        "behavior_respects_hold",
        holding && sim.behavior_state(mourner) == Some(BehaviorState::Wandering),
        "mourner idles through the hold, then wanders",
    ));

    // freeze cancels waits, resume returns to idle and wandering
    sim.pay_respects(mourner, grave);
    sim.freeze(mourner);
    let cancelled = sim.scheduler().pending_for(Owner::Behavior(mourner)) == 0;
    sim.schedule_resume(mourner, 2.0);
    run_for(&mut sim, 1.0, 0.5);
    let still_frozen = sim.behavior_state(mourner) == Some(BehaviorState::Frozen);
    run_for(&mut sim, 1.0, 0.5);
    results.push(check(
        "behavior_freeze_resume",
        cancelled && still_frozen && sim.behavior_state(mourner) == Some(BehaviorState::Wandering),
        "freeze drops timed waits; resume restarts wandering",
    ));

    // death is terminal
    sim.damage(prey, 1000.0);
    let dead = !sim.is_alive(prey);
    results.push(check(
        "behavior_death_terminal",
        dead && !sim.navigate_to(prey, 1) && !sim.assign_quadrant(prey, 1) && !sim.freeze(prey),
        "dead agents refuse every intent",
    ));

    results
}

// ── 6. Soak ─────────────────────────────────────────────────────────────

struct SoakOutcome {
    markers: Vec<(Option<u32>, Option<u32>)>,
    living: usize,
    dead: usize,
    leaked_timers: usize,
    graph_restored: bool,
    sim_time: f64,
    totals: FrameReport,
}

fn soak(level: &LevelData, colonists: u32, minutes: f32) -> Result<SoakOutcome, SimError> {
    let config = SimConfig {
        trigger_chance: 20.0,
        seed: 2024,
        ..Default::default()
    };
    let mut sim = Simulation::new(level, config)?;
    let original = sim.mapper().matrix();

    let quadrants = level.waypoints.len() as u32;
    let agents: Vec<Entity> = (0..colonists)
        .map(|i| {
            let q = i % quadrants;
            let start = sim.mapper().position_of(q).unwrap_or(Vec3::ZERO);
            sim.spawn_agent(AgentSpawn::new(format!("Colonist {i}"), KinematicMotion::new(start, 3.5)).in_quadrant(q))
        })
        .collect();

    for q in 0..quadrants {
        sim.disable_quadrant(q, 5.0 + q as f32 * 7.0, false);
    }

    let totals = run_for(&mut sim, minutes * 60.0, 0.1);

    let dead: Vec<Entity> = agents.iter().copied().filter(|&a| !sim.is_alive(a)).collect();
    let leaked_timers = dead
        .iter()
        .map(|&a| {
            sim.scheduler().pending_for(Owner::Behavior(a)) + sim.scheduler().pending_for(Owner::Events(a))
        })
        .sum();

    Ok(SoakOutcome {
        markers: agents
            .iter()
            .map(|&a| {
                (
                    sim.event_count(a, categories::PENDING_CALLS),
                    sim.event_count(a, categories::MISHAPS),
                )
            })
            .collect(),
        living: sim.living_agents().len(),
        dead: dead.len(),
        leaked_timers,
        graph_restored: sim.mapper().matrix() == original,
        sim_time: sim.sim_time(),
        totals,
    })
}

fn validate_soak(level: &LevelData, verbose: bool) -> Vec<TestResult> {
    println!("--- Soak (120 colonists, 10 minutes) ---");
    let mut results = Vec::new();

    let (first, second) = match (soak(level, 120, 10.0), soak(level, 120, 10.0)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return vec![check("soak_setup", false, e.to_string())],
    };

    results.push(check(
        "soak_time",
        (first.sim_time - 600.0).abs() < 0.01,
        format!("{:.2}s simulated", first.sim_time),
    ));

    let fired = first.markers.iter().filter(|(calls, mishaps)| calls.is_some() || mishaps.is_some()).count();
    results.push(check(
        "soak_events_fired",
        fired > 0 && first.totals.clock_ticks == 120,
        format!("{} colonists touched by events over {} ticks", fired, first.totals.clock_ticks),
    ));

    results.push(check(
        "soak_population_consistent",
        first.living + first.dead == 120,
        format!("{} living, {} dead", first.living, first.dead),
    ));

    results.push(check(
        "soak_no_timers_for_dead",
        first.leaked_timers == 0,
        format!("{} timers owned by dead colonists", first.leaked_timers),
    ));

    results.push(check(
        "soak_graph_restored",
        first.graph_restored,
        "every temporary disable lifted",
    ));

    results.push(check(
        "soak_deterministic",
        first.markers == second.markers && first.dead == second.dead,
        "same seed, same outcome",
    ));

    if verbose {
        let t = first.totals;
        println!(
            "  timers={} ticks={} applied={} arrivals={} wanders={} deaths={} notifications={}",
            t.timers_fired, t.clock_ticks, t.events_applied, t.arrivals, t.wanders_started, t.deaths, t.notifications
        );
    }

    results
}
