//! petbot - pet companion vision CLI
//!
//! Converts COCO annotations into a YOLO dataset, launches training, and
//! watches the camera with the motion-gated detector.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PetConfig;
use crate::dataset::CocoToYolo;
use crate::detect::open_backend;
use crate::gate::MotionGatedDetector;
use crate::ingest::{CameraConfig, CameraSource};
use crate::menu::{run_menu, MenuHandler};
use crate::player::VideoPlayer;
use crate::snapshot::SnapshotWriter;
use crate::train::TrainJob;
use crate::ui::Ui;
use crate::watch::{run_watch, WatchOptions, WatchSinks};

#[derive(Parser, Debug)]
#[command(name = "petbot", version, about = "Pet companion vision tools")]
struct Args {
    /// Config file (TOML or JSON). Falls back to PET_CONFIG.
    #[arg(long, global = true, env = "PET_CONFIG")]
    config: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert the COCO train/val splits into YOLO labels and write the dataset yaml
    Convert,
    /// Train the detector with the Ultralytics CLI
    Train,
    /// Watch the camera with the motion-gated detector
    Watch {
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
        /// Save a snapshot whenever something is detected
        #[arg(long)]
        snapshots: bool,
        /// Camera override (device node, image directory or stub://NAME)
        #[arg(long)]
        device: Option<String>,
    },
    /// Interactive menu (convert / train / watch / exit)
    Menu,
    /// Play a clip through the background player and wait for it
    Play {
        /// Clip name; defaults to player.clip from the config
        clip: Option<String>,
    },
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let cfg = PetConfig::load_from(args.config.as_deref())?;
    crate::logging::init(&cfg.log)?;
    cfg.ensure_dirs()?;

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let stop = StopSignal::default();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            if stop.interrupt() == Interrupt::Exit {
                eprintln!("interrupted");
                std::process::exit(130);
            }
        })
        .context("error setting Ctrl-C handler")?;
    }

    let mut app = App { cfg, ui, stop };
    match args.command {
        Command::Convert => app.convert(),
        Command::Train => app.train(),
        Command::Watch {
            max_frames,
            snapshots,
            device,
        } => app.watch_with(max_frames, snapshots, device),
        Command::Menu => {
            let stdin = std::io::stdin();
            run_menu(stdin.lock(), std::io::stdout(), &mut app)
        }
        Command::Play { clip } => app.play(clip),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Interrupt {
    /// A loop is listening: ask it to wind down.
    Stop,
    Exit,
}

/// Ctrl-C routing. While a watch or playback loop is armed the first Ctrl-C
/// sets the stop flag and a second one exits; anywhere else (convert, train,
/// the menu prompt) Ctrl-C exits straight away.
#[derive(Clone, Default)]
struct StopSignal {
    stop: Arc<AtomicBool>,
    armed: Arc<AtomicBool>,
}

impl StopSignal {
    fn interrupt(&self) -> Interrupt {
        if self.armed.load(Ordering::SeqCst) && !self.stop.swap(true, Ordering::SeqCst) {
            Interrupt::Stop
        } else {
            Interrupt::Exit
        }
    }

    fn arm(&self) -> Armed<'_> {
        self.stop.store(false, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
        Armed(self)
    }

    fn flag(&self) -> &AtomicBool {
        &self.stop
    }
}

/// Disarms the signal when the loop is done.
struct Armed<'a>(&'a StopSignal);

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        self.0.armed.store(false, Ordering::SeqCst);
    }
}

struct App {
    cfg: PetConfig,
    ui: Ui,
    stop: StopSignal,
}

impl App {
    fn watch_with(
        &mut self,
        max_frames: Option<u64>,
        snapshots: bool,
        device: Option<String>,
    ) -> Result<()> {
        let mut camera_config = CameraConfig::from(&self.cfg.camera);
        if let Some(device) = device {
            camera_config.device = device;
        }
        let frame_interval = Duration::from_secs_f64(1.0 / camera_config.target_fps.max(1) as f64);

        let mut source = {
            let _stage = self.ui.stage("Open camera");
            let mut source = CameraSource::new(camera_config)?;
            source.connect()?;
            source
        };

        let mut gate = {
            let _stage = self.ui.stage("Load detector");
            let detector = &self.cfg.detector;
            MotionGatedDetector::load(
                || open_backend(detector),
                detector.params.clone(),
                self.cfg.gate.clone(),
                Instant::now(),
            )
        };

        let writer = SnapshotWriter::new(self.cfg.result_dir());
        let player = self
            .cfg
            .player
            .clip
            .as_deref()
            .map(|clip| (VideoPlayer::new(self.cfg.player.duration), clip));

        let opts = WatchOptions {
            max_frames,
            frame_interval,
            snapshot_on_detect: snapshots,
            ..WatchOptions::default()
        };
        log::info!(
            "watching {} (cool-down {:?}, motion threshold {})",
            source.stats().device,
            self.cfg.gate.cool_down,
            self.cfg.gate.motion_threshold
        );
        if snapshots {
            log::info!("snapshots go to {}", writer.dir().display());
        }

        let armed = self.stop.arm();
        let ticker = self.ui.ticker("watch");
        let summary = run_watch(
            &mut source,
            &mut gate,
            WatchSinks {
                snapshots: snapshots.then_some(&writer),
                player: player.as_ref().map(|(player, clip)| (player, *clip)),
                ticker: Some(&ticker),
            },
            &opts,
            armed.0.flag(),
        );
        drop(armed);
        ticker.finish(format!(
            "{} frames, {} detector calls, {} motion checks, {} snapshots",
            summary.frames, summary.detector_calls, summary.motion_checks, summary.snapshots
        ));
        log::info!(
            "watch finished: frames={} detector_calls={} motion_checks={} transitions={} snapshots={} greetings={} played={} mode={}",
            summary.frames,
            summary.detector_calls,
            summary.motion_checks,
            summary.transitions,
            summary.snapshots,
            summary.greetings,
            summary.player_triggers,
            summary.final_mode
        );
        Ok(())
    }

    fn play(&self, clip: Option<String>) -> Result<()> {
        let clip = clip
            .or_else(|| self.cfg.player.clip.clone())
            .context("no clip given and player.clip is not configured")?;
        let player = VideoPlayer::new(self.cfg.player.duration);
        let _stage = self.ui.stage(&format!("Play {clip}"));
        let armed = self.stop.arm();
        player.trigger_play(&clip);
        while player.is_playing() && !armed.0.flag().load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(50));
        }
        Ok(())
    }
}

impl MenuHandler for App {
    fn convert(&mut self) -> Result<()> {
        let dataset = &self.cfg.dataset;
        let converter = CocoToYolo::new(dataset.target_classes.clone())?;
        let train = dataset.train_split();
        let val = dataset.val_split();
        for split in [&train, &val] {
            let _stage = self.ui.stage(&format!("Convert {} split", split.name));
            converter.convert(split)?;
        }
        let _stage = self.ui.stage("Write dataset yaml");
        converter.write_dataset_yaml(
            &dataset.yaml_path,
            &dataset.out_dir,
            &train.out_images,
            &val.out_images,
        )
    }

    fn train(&mut self) -> Result<()> {
        let _stage = self.ui.stage("Train");
        TrainJob::from_settings(&self.cfg.train).run()
    }

    fn watch(&mut self) -> Result<()> {
        self.watch_with(None, false, None)
    }
}
