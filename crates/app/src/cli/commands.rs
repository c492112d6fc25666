//! Subcommand implementations
//!
//! Every call into the OS device layer or the engine goes through the
//! background queue; results come back to this (foreground) task by value.

use anyhow::{bail, Context};
use serde::Serialize;
use soundroute_core::domain::{
    ConfigManager, ConfigWatcher, CycleOutcome, DeviceCatalog, DeviceChangeListener,
    DeviceChangeMonitor, EngineDevice, EngineEventSubscription, EngineDeviceUpdateInteractor,
    FileSettings, ForegroundSelectionObserver, HardwareDevice, PreferredSelection,
    ReconcileError, RingtoneConfigurationLoadInteractor, RingtoneOutputUpdateInteractor,
    SelectOnEngineStart, SelectionInteractor, SelectionObserver, SelectionReport, SerialQueue,
    SoundEngine, SoundIo, SoundPreferencesEventTarget, SystemDeviceRepository, UseCase,
};
use soundroute_infra::audio::{
    CpalDeviceRepository, LocalRingtonePlayer, LocalSoundEngine, PollingTopologySource,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

const QUEUE_LABEL: &str = "background-queue";

/// Collaborators shared by all subcommands
pub struct Runtime {
    repository: Arc<CpalDeviceRepository>,
    engine: Arc<LocalSoundEngine>,
    settings: Arc<FileSettings>,
    player: Arc<LocalRingtonePlayer>,
    queue: SerialQueue,
}

impl Runtime {
    pub async fn open(manager: ConfigManager) -> Self {
        let settings = Arc::new(manager.open_settings().await);
        let repository = Arc::new(CpalDeviceRepository::new());
        let engine = Arc::new(LocalSoundEngine::new(repository.clone()));
        let player = Arc::new(LocalRingtonePlayer::new(repository.clone()));

        Self {
            repository,
            engine,
            settings,
            player,
            queue: SerialQueue::spawn(QUEUE_LABEL),
        }
    }

    fn selection(&self, observer: Option<Arc<dyn SelectionObserver>>) -> SelectionInteractor {
        let interactor = SelectionInteractor::new(
            self.repository.clone(),
            self.engine.clone(),
            self.settings.clone(),
        );
        match observer {
            Some(observer) => interactor.with_observer(observer),
            None => interactor,
        }
    }

    fn ringtone_update(&self) -> Arc<RingtoneOutputUpdateInteractor> {
        let loader =
            RingtoneConfigurationLoadInteractor::new(self.repository.clone(), self.settings.clone());
        Arc::new(RingtoneOutputUpdateInteractor::new(loader, self.player.clone()))
    }

    fn start_engine(&self) -> anyhow::Result<()> {
        let engine = self.engine.clone();
        if !self.queue.dispatch(move || engine.start()) {
            bail!("Background queue closed");
        }
        Ok(())
    }
}

/// Run `job` on the background queue and wait for its result
async fn on_queue<T, F>(queue: &SerialQueue, job: F) -> anyhow::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let enqueued = queue.dispatch(move || {
        let _ = tx.send(job());
    });
    if !enqueued {
        bail!("Background queue closed");
    }
    rx.await.context("Background job did not complete")
}

#[derive(Debug, Serialize)]
struct DevicesReport {
    system: Vec<HardwareDevice>,
    default_input: Option<String>,
    default_output: Option<String>,
    engine: Vec<EngineDevice>,
    selection: SoundIo<String>,
}

fn capability_tag(has_input: bool, has_output: bool) -> &'static str {
    match (has_input, has_output) {
        (true, true) => "in/out",
        (true, false) => "in",
        (false, true) => "out",
        (false, false) => "-",
    }
}

pub async fn devices(runtime: &Runtime, json: bool) -> anyhow::Result<()> {
    let repository = runtime.repository.clone();
    let engine = runtime.engine.clone();
    let settings = runtime.settings.clone();

    let report = on_queue(&runtime.queue, move || -> Result<DevicesReport, ReconcileError> {
        engine.start();
        let catalog = DeviceCatalog::load(repository.as_ref())?;
        let engine_devices = engine.devices()?;
        let selection = PreferredSelection::new(settings.as_ref())
            .resolve(&catalog)
            .names();

        Ok(DevicesReport {
            default_input: catalog.default_input().map(|d| d.name.clone()),
            default_output: catalog.default_output().map(|d| d.name.clone()),
            system: catalog.all().to_vec(),
            engine: engine_devices,
            selection,
        })
    })
    .await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("System devices:");
    for device in &report.system {
        println!(
            "  [{:<6}] {}  ({})",
            capability_tag(device.has_input, device.has_output),
            device.name,
            device.uid
        );
    }
    println!("Engine devices:");
    for device in &report.engine {
        println!(
            "  #{:<3} [{:<6}] {}",
            device.id,
            capability_tag(device.has_input, device.has_output),
            device.name
        );
    }
    println!(
        "System defaults: input {}, output {}",
        report.default_input.as_deref().unwrap_or("none"),
        report.default_output.as_deref().unwrap_or("none")
    );
    print_sound_io(&report.selection);
    Ok(())
}

fn print_sound_io(sound_io: &SoundIo<String>) {
    let show = |name: &Option<String>| name.clone().unwrap_or_else(|| "none".to_string());
    println!("Effective selection:");
    println!("  input:           {}", show(&sound_io.input));
    println!("  output:          {}", show(&sound_io.output));
    println!("  ringtone output: {}", show(&sound_io.ringtone_output));
}

fn print_report(report: &SelectionReport) {
    match report {
        SelectionReport::Completed(CycleOutcome::Applied(applied)) => println!(
            "Selected input \"{}\" (engine #{}), output \"{}\" (engine #{})",
            applied.input.name, applied.input.id, applied.output.name, applied.output.id
        ),
        SelectionReport::Completed(CycleOutcome::Skipped { role }) => {
            println!("No engine device for {role}; selection unchanged")
        }
        SelectionReport::Failed(message) => println!("Selection failed: {message}"),
    }
}

pub async fn select(runtime: &Runtime) -> anyhow::Result<()> {
    let engine = runtime.engine.clone();
    let selection = runtime.selection(None);
    let ringtone = runtime.ringtone_update();

    let (outcome, ringtone) = on_queue(&runtime.queue, move || {
        engine.start();
        (selection.try_execute(), ringtone.try_execute())
    })
    .await?;

    print_report(&match outcome {
        Ok(outcome) => SelectionReport::Completed(outcome),
        Err(e) => SelectionReport::Failed(e.to_string()),
    });
    match ringtone {
        Ok(configuration) => println!(
            "Ringtone \"{}\" routed to {}",
            configuration.sound_name, configuration.device_uid
        ),
        Err(e) => println!("Ringtone not routed: {e}"),
    }
    Ok(())
}

/// Preference edits from the command line; `None` leaves a setting unchanged
#[derive(Debug, Default)]
pub struct PreferenceEdit {
    pub input: Option<String>,
    pub output: Option<String>,
    pub ringtone_output: Option<String>,
    pub ringtone_sound: Option<String>,
}

pub async fn set(runtime: &Runtime, edit: PreferenceEdit) -> anyhow::Result<()> {
    let sound_io = SoundIo::new(edit.input, edit.output, edit.ringtone_output);
    let changes_devices = sound_io.input.is_some()
        || sound_io.output.is_some()
        || sound_io.ringtone_output.is_some();
    if !changes_devices && edit.ringtone_sound.is_none() {
        bail!("Nothing to set; pass --input, --output, --ringtone-output or --ringtone-sound");
    }

    let (tx, mut reports) = mpsc::unbounded_channel();
    let observer: Arc<dyn SelectionObserver> = Arc::new(ForegroundSelectionObserver::new(tx));
    let selection: Arc<dyn UseCase> = Arc::new(runtime.selection(Some(observer)));
    let ringtone: Arc<dyn UseCase> = runtime.ringtone_update();

    runtime.start_engine()?;
    let target = SoundPreferencesEventTarget::new(
        runtime.repository.clone(),
        runtime.settings.clone(),
        runtime.queue.clone(),
        selection,
        ringtone,
    );

    if changes_devices {
        target.view_did_change_sound_io(sound_io);
    }
    if let Some(name) = edit.ringtone_sound {
        target.view_did_change_ringtone_name(&name);
    }
    runtime.queue.flush().await;

    while let Ok(report) = reports.try_recv() {
        print_report(&report);
    }
    if let Some(configuration) = runtime.player.configuration() {
        println!(
            "Ringtone \"{}\" routed to {}",
            configuration.sound_name, configuration.device_uid
        );
    }
    println!("Saved to {}", runtime.settings.path().display());
    Ok(())
}

async fn next_config_change(rx: &mut Option<broadcast::Receiver<PathBuf>>) -> PathBuf {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(path) => return path,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return std::future::pending().await,
        }
    }
}

pub async fn watch(runtime: &Runtime) -> anyhow::Result<()> {
    let config = runtime.settings.config();
    let (tx, mut reports) = mpsc::unbounded_channel();

    let observer: Arc<dyn SelectionObserver> = Arc::new(ForegroundSelectionObserver::new(tx));
    let selection = Arc::new(runtime.selection(Some(observer)));
    let engine_update = Arc::new(EngineDeviceUpdateInteractor::new(runtime.engine.clone()));
    let ringtone = runtime.ringtone_update();

    // The engine must re-enumerate before selection runs against its list.
    let listeners: Vec<Arc<dyn DeviceChangeListener>> =
        vec![engine_update, selection.clone(), ringtone.clone()];
    let repository: Arc<dyn SystemDeviceRepository> = runtime.repository.clone();
    let topology = Arc::new(PollingTopologySource::new(
        repository,
        Duration::from_millis(config.app.poll_interval_ms),
    ));
    let monitor = DeviceChangeMonitor::new(topology, listeners, runtime.queue.clone());
    monitor.start()?;

    let engine_events = EngineEventSubscription::new(
        runtime.engine.clone(),
        Arc::new(SelectOnEngineStart::new(runtime.queue.clone(), selection.clone())),
    );
    runtime.start_engine()?;
    {
        let ringtone = ringtone.clone();
        runtime.queue.dispatch(move || ringtone.execute());
    }

    let watcher = if config.app.watch_config {
        Some(ConfigWatcher::new(runtime.settings.path().to_path_buf()).await?)
    } else {
        None
    };
    let mut config_changes = watcher.as_ref().map(ConfigWatcher::subscribe);

    info!(
        poll_interval_ms = config.app.poll_interval_ms,
        watch_config = config.app.watch_config,
        "Watching audio devices, press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            Some(report) = reports.recv() => print_report(&report),
            path = next_config_change(&mut config_changes) => {
                info!(path = %path.display(), "Config file changed");
                let settings = runtime.settings.clone();
                let selection = selection.clone();
                let ringtone = ringtone.clone();
                runtime.queue.dispatch(move || {
                    if let Err(e) = settings.reload() {
                        warn!(error = %e, "Keeping previous settings");
                        return;
                    }
                    selection.execute();
                    ringtone.execute();
                });
            }
        }
    }

    monitor.stop();
    drop(engine_events);
    let engine = runtime.engine.clone();
    runtime.queue.dispatch(move || engine.stop());
    runtime.queue.flush().await;
    info!("Stopped watching audio devices");
    Ok(())
}
