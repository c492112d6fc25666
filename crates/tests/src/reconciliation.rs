//! End-to-end reconciliation scenarios
//!
//! These tests wire the real interactors, monitor and queue to the doubles in
//! `doubles` and drive them the way the OS and the engine would.

use crate::doubles::*;
use soundroute_core::domain::{
    CycleOutcome, DeviceChangeListener, DeviceChangeMonitor, EngineDevice,
    EngineDeviceUpdateInteractor, EngineEventSubscription, FileSettings,
    ForegroundSelectionObserver, HardwareDevice, InMemorySettings, KeyValueSettings, Role,
    RingtoneConfigurationLoadInteractor, RingtoneOutputUpdateInteractor, SelectOnEngineStart,
    SelectionInteractor, SelectionReport, SerialQueue, SettingKey, SoundIo,
    SoundPreferencesEventTarget, SoundrouteConfig, UseCase,
};
use soundroute_infra::audio::LocalSoundEngine;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Harness {
    repository: Arc<FakeDeviceRepository>,
    engine: Arc<FakeSoundEngine>,
    settings: Arc<dyn KeyValueSettings>,
    selection: Arc<SelectionInteractor>,
    reports: mpsc::UnboundedReceiver<SelectionReport>,
}

impl Harness {
    fn new(
        repository: FakeDeviceRepository,
        engine: FakeSoundEngine,
        settings: Arc<dyn KeyValueSettings>,
    ) -> Self {
        let repository = Arc::new(repository);
        let engine = Arc::new(engine);
        let (tx, reports) = mpsc::unbounded_channel();
        let selection = Arc::new(
            SelectionInteractor::new(repository.clone(), engine.clone(), settings.clone())
                .with_observer(Arc::new(ForegroundSelectionObserver::new(tx))),
        );

        Self {
            repository,
            engine,
            settings,
            selection,
            reports,
        }
    }

    fn desk(settings: InMemorySettings) -> Self {
        Self::new(
            desk_repository(),
            FakeSoundEngine::new(desk_engine()),
            Arc::new(settings),
        )
    }

    fn monitor(&self, source: Arc<ManualTopologySource>, queue: SerialQueue) -> DeviceChangeMonitor {
        let listeners: Vec<Arc<dyn DeviceChangeListener>> = vec![
            Arc::new(EngineDeviceUpdateInteractor::new(self.engine.clone())),
            self.selection.clone(),
        ];
        DeviceChangeMonitor::new(source, listeners, queue)
    }

    fn drain_reports(&mut self) -> Vec<SelectionReport> {
        let mut reports = Vec::new();
        while let Ok(report) = self.reports.try_recv() {
            reports.push(report);
        }
        reports
    }
}

// ============================================================================
// SELECTION CYCLES
// ============================================================================

#[test]
fn test_preferences_are_applied_across_numbering_spaces() {
    let settings = InMemorySettings::new()
        .with(SettingKey::SoundInput, "USB Headset")
        .with(SettingKey::SoundOutput, "Built-in Output");
    let harness = Harness::desk(settings);

    harness.selection.execute();

    // Engine numbers: USB Headset = 0, Built-in Output = 1.
    assert_eq!(harness.engine.last_selection(), Some((0, 1)));
}

#[test]
fn test_no_preferences_follow_system_defaults() {
    let harness = Harness::desk(InMemorySettings::new());

    harness.selection.execute();

    assert_eq!(harness.engine.last_selection(), Some((2, 1)));
}

#[test]
fn test_unplugged_preferred_device_falls_back_to_default() {
    let settings = InMemorySettings::new()
        .with(SettingKey::SoundInput, "USB Headset")
        .with(SettingKey::SoundOutput, "USB Headset");
    let harness = Harness::desk(settings);
    harness.repository.unplug("AppleUSBAudioEngine:Headset");

    harness.selection.execute();

    assert_eq!(harness.engine.last_selection(), Some((2, 1)));
}

#[test]
fn test_duplicate_names_resolve_to_later_device() {
    let repository = FakeDeviceRepository::new(vec![
        HardwareDevice::new(1, "mic", "Mic").with_input(),
        HardwareDevice::new(2, "hdmi", "Speakers").with_output(),
        HardwareDevice::new(3, "usb", "Speakers").with_output(),
    ])
    .with_defaults("mic", "hdmi");
    let engine = FakeSoundEngine::new(vec![
        EngineDevice::new(7, "Mic").with_input(),
        EngineDevice::new(8, "Speakers").with_output(),
        EngineDevice::new(9, "Speakers").with_output(),
    ]);
    let settings = Arc::new(InMemorySettings::new().with(SettingKey::SoundOutput, "Speakers"));
    let harness = Harness::new(repository, engine, settings);

    harness.selection.execute();

    assert_eq!(harness.engine.last_selection(), Some((7, 9)));
}

#[test]
fn test_os_enumeration_failure_never_selects() {
    let mut harness = Harness::desk(InMemorySettings::new());
    harness.repository.fail_enumeration(-1);

    harness.selection.execute();

    assert!(harness.engine.selections().is_empty());
    match harness.drain_reports().as_slice() {
        [SelectionReport::Failed(message)] => assert!(message.contains("-1")),
        other => panic!("unexpected reports: {other:?}"),
    }
}

#[test]
fn test_stopped_engine_never_selects() {
    let mut harness = Harness::desk(InMemorySettings::new());
    harness.engine.stop();

    harness.selection.execute();

    assert!(harness.engine.selections().is_empty());
    assert!(matches!(
        harness.drain_reports().as_slice(),
        [SelectionReport::Failed(_)]
    ));
}

#[test]
fn test_engine_without_matching_output_skips_cycle() {
    let mut harness = Harness::new(
        desk_repository(),
        FakeSoundEngine::new(vec![EngineDevice::new(0, "Built-in Mic").with_input()]),
        Arc::new(InMemorySettings::new()),
    );

    harness.selection.execute();

    assert!(harness.engine.selections().is_empty());
    assert_eq!(
        harness.drain_reports(),
        vec![SelectionReport::Completed(CycleOutcome::Skipped {
            role: Role::Output
        })]
    );
}

#[test]
fn test_local_engine_joins_on_names_alone() {
    let repository = Arc::new(desk_repository());
    let engine = Arc::new(LocalSoundEngine::new(repository.clone()).without_uids());
    let settings = Arc::new(InMemorySettings::new().with(SettingKey::SoundOutput, "USB Headset"));
    let selection = SelectionInteractor::new(repository, engine.clone(), settings);
    engine.start();

    let outcome = selection.try_execute().unwrap();

    match outcome {
        CycleOutcome::Applied(applied) => {
            assert_eq!(applied.input.name, "Built-in Mic");
            assert_eq!(applied.output.name, "USB Headset");
            assert_eq!(engine.selected(), Some((applied.input.id, applied.output.id)));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

// ============================================================================
// DEVICE CHANGES
// ============================================================================

#[tokio::test]
async fn test_plugged_headset_is_selected_after_engine_refresh() {
    let repository = FakeDeviceRepository::new(desk_hardware()[..2].to_vec())
        .with_defaults("BuiltInMicDevice", "BuiltInSpeakerDevice");
    let engine = FakeSoundEngine::new(vec![
        EngineDevice::new(0, "Built-in Mic").with_input(),
        EngineDevice::new(1, "Built-in Output").with_output(),
    ]);
    let settings = InMemorySettings::new()
        .with(SettingKey::SoundInput, "USB Headset")
        .with(SettingKey::SoundOutput, "USB Headset");
    let harness = Harness::new(repository, engine, Arc::new(settings));
    let source = Arc::new(ManualTopologySource::default());
    let queue = SerialQueue::spawn("reconciliation-test");
    let monitor = harness.monitor(source.clone(), queue.clone());
    monitor.start().unwrap();

    harness.repository.plug(desk_hardware()[2].clone());
    // The engine only sees the headset once it re-enumerates.
    harness.engine.stage(vec![
        EngineDevice::new(0, "Built-in Mic").with_input(),
        EngineDevice::new(1, "Built-in Output").with_output(),
        EngineDevice::new(2, "USB Headset").with_input().with_output(),
    ]);
    source.notify_from_os_thread();
    queue.flush().await;

    assert_eq!(harness.engine.refresh_count(), 1);
    assert_eq!(harness.engine.last_selection(), Some((2, 2)));
}

#[tokio::test]
async fn test_each_notification_runs_one_cycle_in_order() {
    let harness = Harness::desk(InMemorySettings::new());
    let source = Arc::new(ManualTopologySource::default());
    let queue = SerialQueue::spawn("reconciliation-test");
    let monitor = harness.monitor(source.clone(), queue.clone());
    monitor.start().unwrap();

    for _ in 0..5 {
        source.notify();
    }
    queue.flush().await;

    assert_eq!(harness.engine.refresh_count(), 5);
    assert_eq!(harness.engine.selections().len(), 5);
}

#[tokio::test]
async fn test_stopped_monitor_runs_no_cycles() {
    let harness = Harness::desk(InMemorySettings::new());
    let source = Arc::new(ManualTopologySource::default());
    let queue = SerialQueue::spawn("reconciliation-test");
    let monitor = harness.monitor(source.clone(), queue.clone());

    monitor.start().unwrap();
    monitor.stop();
    source.notify();
    queue.flush().await;

    assert_eq!(source.subscriber_count(), 0);
    assert!(harness.engine.selections().is_empty());
}

#[tokio::test]
async fn test_engine_start_triggers_selection() {
    let harness = Harness::desk(InMemorySettings::new());
    let queue = SerialQueue::spawn("reconciliation-test");
    harness.engine.stop();

    let subscription = EngineEventSubscription::new(
        harness.engine.clone(),
        Arc::new(SelectOnEngineStart::new(queue.clone(), harness.selection.clone())),
    );
    harness.engine.finish_starting();
    queue.flush().await;

    assert_eq!(harness.engine.last_selection(), Some((2, 1)));

    drop(subscription);
    assert_eq!(harness.engine.target_count(), 0);
}

// ============================================================================
// PREFERENCES
// ============================================================================

#[tokio::test]
async fn test_preference_change_persists_and_reselects() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    let file_settings = Arc::new(FileSettings::new(path.clone(), SoundrouteConfig::default()));
    file_settings.set(SettingKey::RingtoneSound, "Purr".to_string());

    let harness = Harness::new(
        desk_repository(),
        FakeSoundEngine::new(desk_engine()),
        file_settings.clone(),
    );
    let player = Arc::new(RecordingRingtonePlayer::default());
    let ringtone = Arc::new(RingtoneOutputUpdateInteractor::new(
        RingtoneConfigurationLoadInteractor::new(harness.repository.clone(), harness.settings.clone()),
        player.clone(),
    ));
    let queue = SerialQueue::spawn("reconciliation-test");
    let target = SoundPreferencesEventTarget::new(
        harness.repository.clone(),
        harness.settings.clone(),
        queue.clone(),
        harness.selection.clone(),
        ringtone,
    );

    target.view_did_change_sound_io(SoundIo::new(
        Some("USB Headset".to_string()),
        Some("Built-in Output".to_string()),
        Some("USB Headset".to_string()),
    ));
    queue.flush().await;

    assert_eq!(harness.engine.last_selection(), Some((0, 1)));
    let configured = player.configured();
    assert_eq!(configured.len(), 1);
    assert_eq!(configured[0].sound_name, "Purr");
    assert_eq!(configured[0].device_uid.as_str(), "AppleUSBAudioEngine:Headset");

    // Survives a reload from disk.
    let reloaded = FileSettings::new(path, SoundrouteConfig::default());
    reloaded.reload().unwrap();
    assert_eq!(reloaded.get(SettingKey::SoundInput).as_deref(), Some("USB Headset"));
}
