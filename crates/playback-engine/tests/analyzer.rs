use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gymkhana_common::config::AppConfig;
use gymkhana_common::error::{ErrorKind, Failure};
use gymkhana_media::backend::MediaBackend;
use gymkhana_media::synthetic::{SyntheticBackend, SyntheticVideo};
use gymkhana_playback_engine::{Analyzer, PlaybackState};
use gymkhana_sync_model::metadata::Slot;
use gymkhana_sync_model::range::{ExportRange, QuickRange};
use gymkhana_sync_model::sync::PlaybackSpeed;

fn backend() -> Arc<SyntheticBackend> {
    Arc::new(
        SyntheticBackend::new()
            .with_video("p.mp4", SyntheticVideo::new(30.0, 900, 8, 4).with_seed(10))
            .with_video("s.mp4", SyntheticVideo::new(25.0, 750, 8, 4).with_seed(200)),
    )
}

fn loaded(backend: &Arc<SyntheticBackend>) -> Analyzer {
    let shared: Arc<dyn MediaBackend> = backend.clone();
    let mut analyzer = Analyzer::new(shared);
    analyzer.load_source(Slot::Primary, Path::new("p.mp4")).unwrap();
    analyzer.load_source(Slot::Shadow, Path::new("s.mp4")).unwrap();
    analyzer
}

/// Poll until the job reports its outcome.
fn drain(analyzer: &mut Analyzer) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while analyzer.export_active() {
        analyzer.poll_export();
        assert!(Instant::now() < deadline, "export did not finish");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_render_reports_host_fields() {
    let backend = backend();
    let mut analyzer = loaded(&backend);
    analyzer.seek(12.0);
    let rendered = analyzer.render().unwrap();
    assert_eq!(rendered.primary_index, 360);
    assert!((rendered.primary_time - 12.0).abs() < 1e-9);
    assert!((rendered.max_time - 30.0).abs() < 1e-9);
}

#[test]
fn test_failed_render_lags_behind_position() {
    let backend = Arc::new(
        SyntheticBackend::new()
            .with_video(
                "p.mp4",
                SyntheticVideo::new(30.0, 900, 8, 4).with_unreadable_frames([60]),
            )
            .with_video("s.mp4", SyntheticVideo::new(25.0, 750, 8, 4)),
    );
    let mut analyzer = loaded(&backend);

    analyzer.seek(1.0);
    assert_eq!(analyzer.position(), 30);
    assert_eq!(analyzer.render().unwrap().primary_index, 30);

    analyzer.seek(2.0);
    assert_eq!(analyzer.position(), 60);
    assert!((analyzer.current_time() - 2.0).abs() < 1e-9);
    let shown = analyzer.render().unwrap().primary_index;
    assert_eq!(shown, 30);
    assert_ne!(shown, analyzer.position());
}

#[test]
fn test_export_callbacks_fire_on_poll() {
    let backend = backend();
    let mut analyzer = loaded(&backend);

    let percents = Arc::new(Mutex::new(Vec::new()));
    let completed = Arc::new(Mutex::new(None::<PathBuf>));
    {
        let percents = Arc::clone(&percents);
        analyzer.on_export_progress(move |p| percents.lock().unwrap().push(p));
        let completed = Arc::clone(&completed);
        analyzer.on_export_complete(move |path| *completed.lock().unwrap() = Some(path.to_path_buf()));
    }

    analyzer
        .start_export(QuickRange::FirstTen.range(), "exports/first")
        .unwrap();
    assert!(analyzer.export_active());
    drain(&mut analyzer);

    assert_eq!(
        completed.lock().unwrap().as_deref(),
        Some(Path::new("exports/first.mp4"))
    );
    let percents = percents.lock().unwrap();
    assert_eq!(percents.first().copied(), Some(0.0));
    assert_eq!(percents.last().copied(), Some(100.0));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));

    let summary = analyzer.last_export_summary().unwrap();
    assert_eq!(summary.frames_written, 300);
    assert_eq!(
        backend.output(Path::new("exports/first.mp4")).unwrap().frames.len(),
        300
    );
}

#[test]
fn test_export_without_sources_is_invalid() {
    let shared: Arc<dyn MediaBackend> = backend();
    let mut analyzer = Analyzer::new(shared);
    let err = analyzer
        .start_export(ExportRange::new(0.0, 1.0).unwrap(), "out.mp4")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRange);
}

#[test]
fn test_second_export_is_rejected_while_first_runs() {
    let backend = backend();
    let mut analyzer = loaded(&backend);
    backend.hold_reads();

    analyzer
        .start_export(ExportRange::new(0.0, 1.0).unwrap(), "a.mp4")
        .unwrap();
    let err = analyzer
        .start_export(ExportRange::new(1.0, 2.0).unwrap(), "b.mp4")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyRunning);

    backend.release_reads();
    drain(&mut analyzer);
    assert!(analyzer.last_export_summary().is_some());

    // The slot is free again.
    analyzer
        .start_export(ExportRange::new(1.0, 2.0).unwrap(), "b.mp4")
        .unwrap();
    drain(&mut analyzer);
}

#[test]
fn test_every_started_export_reports_an_outcome() {
    let backend = backend();
    let mut analyzer = loaded(&backend);

    let outcomes = Arc::new(Mutex::new(0usize));
    {
        let done = Arc::clone(&outcomes);
        analyzer.on_export_complete(move |_| *done.lock().unwrap() += 1);
        let failed = Arc::clone(&outcomes);
        analyzer.on_export_failed(move |_| *failed.lock().unwrap() += 1);
    }

    // Restart as eagerly as possible so a start can land between the
    // worker exiting and its outcome being polled.
    let range = ExportRange::new(0.0, 0.05).unwrap();
    let deadline = Instant::now() + Duration::from_secs(30);
    let mut started = 0;
    while started < 300 {
        match analyzer.start_export(range, format!("loop/{started}.mp4")) {
            Ok(_) => started += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::AlreadyRunning),
        }
        assert!(Instant::now() < deadline, "exports did not finish");
    }
    drain(&mut analyzer);

    assert_eq!(*outcomes.lock().unwrap(), started);
}

#[test]
fn test_export_uses_settings_snapshot() {
    let backend = backend();
    let mut analyzer = loaded(&backend);
    analyzer.set_offset(1.5).unwrap();
    analyzer.set_opacity(0.8).unwrap();

    analyzer
        .start_export(ExportRange::new(2.0, 3.0).unwrap(), "snap.mp4")
        .unwrap();
    analyzer.set_offset(-5.0).unwrap();
    analyzer.set_opacity(0.1).unwrap();
    drain(&mut analyzer);

    let summary = analyzer.last_export_summary().unwrap();
    assert_eq!(summary.offset_secs, 1.5);
    assert!((summary.opacity - 0.8).abs() < 1e-12);
}

#[test]
fn test_failure_callback_receives_kind() {
    let backend = backend();
    backend.set_fail_sink_creation(true);
    let mut analyzer = loaded(&backend);

    let failures = Arc::new(Mutex::new(Vec::<Failure>::new()));
    {
        let failures = Arc::clone(&failures);
        analyzer.on_export_failed(move |f| failures.lock().unwrap().push(f.clone()));
    }

    analyzer
        .start_export(ExportRange::new(0.0, 1.0).unwrap(), "fail.mp4")
        .unwrap();
    drain(&mut analyzer);

    let failures = failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, ErrorKind::SinkCreationFailed);
    assert!(analyzer.last_export_summary().is_none());
}

#[test]
fn test_cancel_export() {
    let backend = backend();
    let mut analyzer = loaded(&backend);
    let failures = Arc::new(Mutex::new(Vec::<Failure>::new()));
    {
        let failures = Arc::clone(&failures);
        analyzer.on_export_failed(move |f| failures.lock().unwrap().push(f.clone()));
    }
    backend.hold_reads();

    analyzer
        .start_export(ExportRange::new(0.0, 5.0).unwrap(), "cancel.mp4")
        .unwrap();
    analyzer.cancel_export();
    backend.release_reads();
    drain(&mut analyzer);

    assert_eq!(failures.lock().unwrap()[0].kind, ErrorKind::Cancelled);
}

#[test]
fn test_from_config_applies_defaults() {
    let mut config = AppConfig::default();
    config.playback.offset_secs = 2.0;
    config.playback.opacity = 0.3;
    config.playback.speed = 1.5;
    config.export.default_extension = "mkv".to_string();

    let backend = backend();
    let shared: Arc<dyn MediaBackend> = backend.clone();
    let mut analyzer = Analyzer::from_config(shared, &config).unwrap();
    assert_eq!(analyzer.controller().sync().offset_secs(), 2.0);
    assert_eq!(analyzer.controller().speed(), PlaybackSpeed::OneAndHalf);

    analyzer.load_source(Slot::Primary, Path::new("p.mp4")).unwrap();
    analyzer.load_source(Slot::Shadow, Path::new("s.mp4")).unwrap();
    analyzer
        .start_export(ExportRange::new(0.0, 1.0).unwrap(), "out/cfg")
        .unwrap();
    drain(&mut analyzer);
    assert_eq!(
        analyzer.last_export_summary().unwrap().output_path,
        PathBuf::from("out/cfg.mkv")
    );

    config.playback.speed = 3.0;
    let shared: Arc<dyn MediaBackend> = backend;
    let err = Analyzer::from_config(shared, &config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn test_play_toggle_and_close() {
    let backend = backend();
    let mut analyzer = loaded(&backend);
    assert_eq!(analyzer.play_toggle(), PlaybackState::Playing);
    analyzer.set_speed(0.5).unwrap();
    analyzer.close();
    assert_eq!(analyzer.controller().state(), PlaybackState::Paused);
    assert!(analyzer.render().is_none());
    assert_eq!(analyzer.controller().speed(), PlaybackSpeed::Half);
}
