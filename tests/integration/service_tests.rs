//! NodeService start-up and command handling.

use radvalve::app::commands::NodeCommand;
use radvalve::app::events::NodeEvent;
use radvalve::app::ports::NonVolatileStore;
use radvalve::app::service::NodeService;
use radvalve::config::NodeConfig;
use radvalve::control::Mode;
use radvalve::control::targets::NV_FROST_C;
use radvalve::occupancy::OccupancyTracker;
use radvalve::payload::{decode_core_stats, verify_json_frame};
use radvalve::stats::{STATS_END, STATS_START, StatsSet};

use crate::mock_hw::MockBoard;

fn service(config: NodeConfig) -> NodeService<MockBoard> {
    let tracker: &'static OccupancyTracker = Box::leak(Box::default());
    NodeService::new(config, tracker)
}

#[test]
fn start_announces_and_sends_both_encodings() {
    let mut board = MockBoard::new().at(7, 15, 30);
    let mut svc = service(NodeConfig::default());
    svc.start(&mut board);

    assert!(matches!(board.events.first(), Some(NodeEvent::Started(s)) if s.mode == Mode::Frost));
    assert_eq!(board.sent.len(), 2);
    assert!(decode_core_stats(&board.sent[0]).is_ok());
    assert_eq!(board.sent[1][0], b'{');
    assert!(verify_json_frame(&board.sent[1]).is_ok());
    assert_eq!(svc.node().time_lsd, 30);
}

#[test]
fn start_without_stats_stays_silent() {
    let mut board = MockBoard::new();
    let mut svc = service(NodeConfig {
        stats_tx: false,
        ..NodeConfig::default()
    });
    svc.start(&mut board);
    assert!(board.sent.is_empty());
}

#[test]
fn rejected_settings_leave_nv_untouched() {
    let mut board = MockBoard::new();
    let mut svc = service(NodeConfig::default());
    svc.start(&mut board);
    let wear = board.nvs.wear();

    assert!(svc.handle_command(&mut board, NodeCommand::SetFrostTarget(99)).is_err());
    assert!(svc.handle_command(&mut board, NodeCommand::SetWarmTarget(2)).is_err());
    assert!(svc.handle_command(&mut board, NodeCommand::SetMinValvePcReallyOpen(0)).is_err());
    assert!(svc.handle_command(&mut board, NodeCommand::SetMinValvePcReallyOpen(101)).is_err());
    assert!(
        svc.handle_command(&mut board, NodeCommand::SetSchedule { which: 9, minutes: 60 })
            .is_err()
    );
    assert!(
        svc.handle_command(&mut board, NodeCommand::SetSchedule { which: 0, minutes: 24 * 60 })
            .is_err()
    );
    assert_eq!(board.nvs.wear(), wear);
}

#[test]
fn accepted_frost_target_is_persisted() {
    let mut board = MockBoard::new();
    let mut svc = service(NodeConfig::default());
    svc.start(&mut board);
    svc.handle_command(&mut board, NodeCommand::SetFrostTarget(9)).unwrap();
    assert_eq!(board.read_byte(NV_FROST_C), 9);
}

#[test]
fn ui_command_changes_mode_and_reports_status() {
    let mut board = MockBoard::new().at(0, 0, 1);
    let mut svc = service(NodeConfig {
        stats_tx: false,
        ..NodeConfig::default()
    });
    svc.start(&mut board);
    board.clear();

    board.ui.push_back(NodeCommand::SetWarmMode(true));
    svc.tick(&mut board);
    assert_eq!(svc.node().mode.mode(), Mode::Warm);
    assert!(matches!(board.events.last(), Some(NodeEvent::Status(s)) if s.mode == Mode::Warm));
    // Manual control is strong evidence someone is in.
    assert!(svc.node().occupancy().is_likely_occupied());
}

#[test]
fn cli_zap_erases_stats_over_several_ticks() {
    let mut board = MockBoard::new().at(0, 0, 1);
    let mut svc = service(NodeConfig {
        stats_tx: false,
        ..NodeConfig::default()
    });
    for addr in STATS_START..=STATS_END {
        board.smart_update_byte(addr, 10);
    }
    let first = StatsSet::TempByHour.addr(3);
    let last = StatsSet::WarmModeByHourOfWeek.addr(20);
    svc.start(&mut board);

    // The CLI is only polled after a status report, so drive it from the UI.
    board.ui.push_back(NodeCommand::SetWarmMode(true));
    board.cli.push_back(NodeCommand::ZapStats);
    svc.tick(&mut board);
    assert!(svc.node().zap_pending());

    for _ in 0..20 {
        svc.tick(&mut board);
    }
    assert!(!svc.node().zap_pending());
    assert_eq!(board.read_byte(first), 0xff);
    assert_eq!(board.read_byte(last), 0xff);
}

#[test]
fn bake_runs_warm_and_cancels() {
    let mut board = MockBoard::new();
    let mut svc = service(NodeConfig::default());
    svc.start(&mut board);
    svc.handle_command(&mut board, NodeCommand::StartBake).unwrap();
    assert_eq!(svc.node().mode.mode(), Mode::Bake);
    svc.handle_command(&mut board, NodeCommand::CancelBake).unwrap();
    assert_eq!(svc.node().mode.mode(), Mode::Warm);
    svc.handle_command(&mut board, NodeCommand::SetWarmMode(false)).unwrap();
    assert_eq!(svc.node().mode.mode(), Mode::Frost);
}
