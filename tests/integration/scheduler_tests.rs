//! Tick scheduler scenarios against the mock board.

use radvalve::app::commands::NodeCommand;
use radvalve::app::events::NodeEvent;
use radvalve::app::service::NodeService;
use radvalve::config::NodeConfig;
use radvalve::node::overrun_count;
use radvalve::occupancy::OccupancyTracker;
use radvalve::payload::{CoreStats, OccupancyCode, decode_core_stats, encode_core_stats};
use radvalve::scheduler::hub::set_min_boiler_on_minutes;

use crate::mock_hw::{BoardCall, MockBoard};

fn tracker() -> &'static OccupancyTracker {
    Box::leak(Box::default())
}

fn started(config: NodeConfig, board: &mut MockBoard) -> NodeService<MockBoard> {
    let mut svc = NodeService::new(config, tracker());
    svc.start(board);
    board.clear();
    svc
}

fn quiet() -> NodeConfig {
    NodeConfig {
        stats_tx: false,
        ..NodeConfig::default()
    }
}

// ── Overrun ───────────────────────────────────────────────────

#[test]
fn overrun_is_counted_once_and_resyncs_the_link() {
    let mut board = MockBoard::new().at(0, 0, 5);
    board.link_enabled = true;
    let config = NodeConfig {
        local_trv: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);

    // The UI poll at second 6 takes two seconds.
    board.jump_in_ui = 2;
    svc.tick(&mut board);

    let overruns = board.events_matching(|e| matches!(e, NodeEvent::Overrun { .. }));
    assert_eq!(overruns, vec![&NodeEvent::Overrun { count: 1 }]);
    assert_eq!(board.count(|c| *c == BoardCall::SyncReset), 1);
    assert_eq!(overrun_count(&board), 1);
    assert_eq!(svc.node().time_lsd, 8);

    // The next tick sleeps to second 9 and runs clean.
    board.clear();
    svc.tick(&mut board);
    assert_eq!(board.count(|c| *c == BoardCall::Sleep), 1);
    assert_eq!(svc.node().time_lsd, 9);
    assert!(board.events_matching(|e| matches!(e, NodeEvent::Overrun { .. })).is_empty());
    assert_eq!(overrun_count(&board), 1);
}

#[test]
fn on_time_ticks_never_overrun() {
    let mut board = MockBoard::new().at(0, 0, 0);
    let mut svc = started(quiet(), &mut board);
    for _ in 0..120 {
        svc.tick(&mut board);
    }
    assert_eq!(overrun_count(&board), 0);
    assert_eq!(svc.tick_count(), 120);
}

// ── Minute table ──────────────────────────────────────────────

#[test]
fn sensors_are_read_in_minute_order() {
    let mut board = MockBoard::new().at(0, 0, 59);
    let config = NodeConfig {
        humidity_sensor: true,
        temp_pot: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);
    svc.handle_command(&mut board, NodeCommand::SetWarmMode(true)).unwrap();
    board.clear();

    for _ in 0..60 {
        svc.tick(&mut board);
    }

    let reads: Vec<&BoardCall> = board
        .calls
        .iter()
        .filter(|c| {
            matches!(
                c,
                BoardCall::ReadSupply
                    | BoardCall::ReadTempPot
                    | BoardCall::ReadHumidity
                    | BoardCall::ReadAmbientLight
                    | BoardCall::ReadTemperature
            )
        })
        .collect();
    assert_eq!(
        reads,
        vec![
            &BoardCall::ReadSupply,
            &BoardCall::ReadTempPot,
            &BoardCall::ReadHumidity,
            &BoardCall::ReadAmbientLight,
            &BoardCall::ReadTemperature,
        ]
    );
    assert_eq!(board.events_matching(|e| matches!(e, NodeEvent::Status(_))).len(), 1);
    assert_eq!(svc.node().minute_count, 1);
}

#[test]
fn two_second_tick_still_reaches_every_slot() {
    let mut board = MockBoard::new().at(0, 0, 58);
    board.tick_seconds = 2;
    let config = NodeConfig {
        two_second_tick: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);
    svc.handle_command(&mut board, NodeCommand::SetWarmMode(true)).unwrap();
    board.clear();

    for _ in 0..30 {
        svc.tick(&mut board);
    }
    assert_eq!(board.count(|c| *c == BoardCall::ReadSupply), 1);
    assert_eq!(board.count(|c| *c == BoardCall::ReadAmbientLight), 1);
    assert_eq!(board.count(|c| *c == BoardCall::ReadTemperature), 1);
}

#[test]
fn cold_room_opens_the_valve_at_second_56() {
    let mut board = MockBoard::new().at(0, 0, 55);
    board.link_enabled = true;
    board.temp_c16 = 10 * 16;
    let config = NodeConfig {
        local_trv: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);
    svc.handle_command(&mut board, NodeCommand::SetWarmMode(true)).unwrap();
    board.clear();

    svc.tick(&mut board);
    let moved = board.events_matching(|e| matches!(e, NodeEvent::ValveMoved { .. }));
    let [NodeEvent::ValveMoved { from_pc, to_pc, .. }] = moved.as_slice() else {
        panic!("expected one valve move, got {:?}", board.events);
    };
    assert_eq!(*from_pc, 0);
    assert!(*to_pc > 0);
    assert!(board.count(|c| matches!(c, BoardCall::ValveFrame { percent_open, .. } if *percent_open == *to_pc)) == 1);

    // Next tick drives the boiler for the open valve.
    svc.tick(&mut board);
    assert_eq!(board.heat_call(), Some(true));
}

// ── Hub ───────────────────────────────────────────────────────

#[test]
fn heard_call_holds_boiler_for_minimum_run() {
    let mut board = MockBoard::new().at(0, 0, 10);
    set_min_boiler_on_minutes(&mut board, 1);
    let config = NodeConfig {
        hub_listen: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);

    board.heard = Some(0x1234);
    svc.tick(&mut board);
    assert!(board.events.contains(&NodeEvent::RemoteCallForHeat { house_code: 0x1234 }));
    assert!(board.events.contains(&NodeEvent::Boiler { on: true }));
    assert_eq!(board.heat_call(), Some(true));
    assert!(board.count(|c| *c == BoardCall::Eavesdrop) > 0);

    for _ in 0..59 {
        svc.tick(&mut board);
    }
    assert!(!board.events.contains(&NodeEvent::Boiler { on: false }));
    assert!(svc.node().hub.boiler_on());

    svc.tick(&mut board);
    assert!(board.events.contains(&NodeEvent::Boiler { on: false }));
    assert_eq!(board.heat_call(), Some(false));
    // A hub with no valve of its own keeps listening.
    assert!(board.count(|c| *c == BoardCall::Nap) > 0);
}

#[test]
fn hub_disabled_when_min_boiler_time_is_zero() {
    let mut board = MockBoard::new().at(0, 0, 10);
    let config = NodeConfig {
        hub_listen: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);
    board.heard = Some(0x0102);
    svc.tick(&mut board);
    assert!(!board.events.iter().any(|e| matches!(e, NodeEvent::Boiler { .. })));
    assert_eq!(board.count(|c| *c == BoardCall::Eavesdrop), 0);
}

#[test]
fn hub_with_own_valve_calls_for_heat_for_either() {
    let mut board = MockBoard::new().at(0, 0, 55);
    board.link_enabled = true;
    board.temp_c16 = 10 * 16;
    set_min_boiler_on_minutes(&mut board, 1);
    let config = NodeConfig {
        local_trv: true,
        hub_listen: true,
        ..quiet()
    };
    assert!(config.validate().is_ok());
    let mut svc = started(config, &mut board);
    svc.handle_command(&mut board, NodeCommand::SetWarmMode(true)).unwrap();
    board.clear();

    // Second 56 opens the valve; the next tick drives the output for it.
    svc.tick(&mut board);
    svc.tick(&mut board);
    assert_eq!(board.heat_call(), Some(true));
    assert!(!svc.node().hub.boiler_on());

    board.heard = Some(0x0a0b);
    svc.tick(&mut board);
    assert!(board.events.contains(&NodeEvent::Boiler { on: true }));
    assert_eq!(board.heat_call(), Some(true));
}

// ── Inbound frames ────────────────────────────────────────────

#[test]
fn garbled_inbound_frames_are_counted() {
    let mut board = MockBoard::new().at(0, 0, 10);
    let config = NodeConfig {
        hub_listen: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);

    board.inbound.push_back(heapless::Vec::from_slice(&[0x00, 0x01, 0x02]).unwrap());
    svc.tick(&mut board);
    assert!(board.events.contains(&NodeEvent::Garbled { count: 1 }));

    let stats = CoreStats {
        id: Some([0x44, 0x55]),
        temp_c16: Some(20 * 16),
        power_low: false,
        amb_light: Some(30),
        occupancy: OccupancyCode::Vacant,
    };
    let mut buf = [0u8; 16];
    let n = encode_core_stats(&mut buf, &stats).unwrap();
    board.inbound.push_back(heapless::Vec::from_slice(&buf[..n]).unwrap());
    svc.tick(&mut board);
    assert!(board.events.contains(&NodeEvent::RemoteStats(stats)));
    assert_eq!(svc.node().garbled_frames, 1);
}

#[test]
fn near_overrun_skips_inbound_work() {
    let mut board = MockBoard::new().at(0, 0, 10);
    let config = NodeConfig {
        hub_listen: true,
        ..quiet()
    };
    let mut svc = started(config, &mut board);
    board.inbound.push_back(heapless::Vec::from_slice(&[0x00]).unwrap());
    board.sct = 250;
    svc.tick(&mut board);
    assert!(board.events.contains(&NodeEvent::NearOverrun));
    assert_eq!(board.inbound.len(), 1);
}

// ── Stats ─────────────────────────────────────────────────────

#[test]
fn binary_stats_go_out_in_the_minute_after_sensing() {
    let mut board = MockBoard::new().at(0, 0, 59);
    let config = NodeConfig {
        json_stats: false,
        ..NodeConfig::default()
    };
    let mut svc = started(config, &mut board);
    svc.handle_command(&mut board, NodeCommand::SetWarmMode(true)).unwrap();
    board.clear();

    for _ in 0..11 {
        svc.tick(&mut board);
    }
    assert_eq!(board.sent.len(), 1);
    let (stats, _) = decode_core_stats(&board.sent[0]).unwrap();
    assert_eq!(stats.id, Some([0xff, 0xff]));
    assert_eq!(stats.temp_c16, Some(18 * 16));
    assert!(board.events.iter().any(|e| matches!(e, NodeEvent::StatsSent { binary: true, .. })));
}

#[test]
fn failed_transmit_is_reported() {
    let mut board = MockBoard::new().at(0, 0, 59);
    let config = NodeConfig {
        json_stats: false,
        ..NodeConfig::default()
    };
    let mut svc = started(config, &mut board);
    board.tx_fails = true;
    for _ in 0..11 {
        svc.tick(&mut board);
    }
    assert!(board.sent.is_empty());
    assert!(board.events.iter().any(|e| matches!(e, NodeEvent::LinkFailed(_))));
    assert!(!board.events.iter().any(|e| matches!(e, NodeEvent::StatsSent { .. })));
}
