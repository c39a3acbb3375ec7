//! End-to-end loop scenarios on the synthetic camera, stub detector and headless surface.

use std::path::{Path, PathBuf};
use std::time::Duration;

use helmet_watch::annotate::label_origin;
use helmet_watch::{
    start_session, CameraSpec, Detection, DetectionParams, FrameSource, HeadlessSurface,
    HelmetConfig, HelmetDetector, PollSettings, Session, SourceMode, StartupError, StopReason,
    StubBackend, HELMET_LABEL, WARNING_TEXT,
};

fn write_still(dir: &Path) -> PathBuf {
    let path = dir.join("test_helmet.png");
    let mut img = image::RgbImage::from_pixel(320, 240, image::Rgb([90, 90, 90]));
    for x in 100..160 {
        img.put_pixel(x, 50, image::Rgb([250, 250, 0]));
    }
    img.save(&path).expect("write still image");
    path
}

#[test]
fn image_mode_without_helmets_warns_every_cycle_until_quit() {
    let dir = tempfile::tempdir().unwrap();
    let still = write_still(dir.path());

    let source = FrameSource::open(&CameraSpec::Offline, &still).expect("fallback to image");
    assert_eq!(source.mode(), SourceMode::Image);
    std::fs::remove_file(&still).unwrap();

    let (surface, log) = HeadlessSurface::recording(
        "Helmet Detection",
        vec![None, Some('x'), None, Some('q')],
    );
    let session = Session::new(
        source,
        HelmetDetector::new(StubBackend::new(), DetectionParams::default()),
        Box::new(surface),
        PollSettings::default(),
    );
    let summary = session.run();

    assert_eq!(summary.stop_reason, StopReason::QuitKey);
    assert_eq!(summary.mode, SourceMode::Image);
    assert_eq!(summary.frames, 4);
    assert!(!summary.camera_released);
    assert!(log.is_closed());

    let shown = log.presented();
    assert_eq!(shown.len(), 4);
    for presentation in &shown {
        assert_eq!(presentation.frame, shown[0].frame);
        assert_eq!(presentation.overlay.helmet_count(), 0);
        assert!(presentation.overlay.shows_warning());
        assert!(presentation
            .overlay
            .texts()
            .any(|(text, _)| text == "Helmets: 0"));
    }
    assert_eq!(shown[0].frame.pixel(100, 50), Some([0, 250, 250]));
    assert_eq!(log.poll_timeouts(), vec![Duration::from_millis(500); 4]);
}

#[test]
fn webcam_mode_counts_and_labels_follow_each_frame() {
    let hits = vec![
        vec![Detection::new(20, 40, 60, 60)],
        vec![],
        vec![Detection::new(10, 10, 80, 80), Detection::new(300, 200, 100, 100)],
    ];
    let source = FrameSource::open(
        &CameraSpec::Synthetic { frame_limit: None },
        Path::new("/nonexistent/unused.jpg"),
    )
    .expect("synthetic camera");
    let (surface, log) = HeadlessSurface::recording("cam", vec![None, None, Some('q')]);
    let summary = Session::new(
        source,
        HelmetDetector::new(StubBackend::scripted(hits.clone()), DetectionParams::default()),
        Box::new(surface),
        PollSettings::default(),
    )
    .run();

    assert_eq!(summary.mode, SourceMode::Webcam);
    assert!(summary.camera_released);
    let shown = log.presented();
    assert_eq!(shown.len(), 3);
    for (presentation, expected) in shown.iter().zip(&hits) {
        let overlay = &presentation.overlay;
        assert_eq!(overlay.helmet_count(), expected.len());
        assert_eq!(overlay.shows_warning(), expected.is_empty());
        let labels: Vec<_> = overlay
            .texts()
            .filter(|(text, _)| *text == HELMET_LABEL)
            .map(|(_, origin)| origin)
            .collect();
        let wanted: Vec<_> = expected.iter().map(label_origin).collect();
        assert_eq!(labels, wanted);
    }
    assert_ne!(shown[0].frame, shown[1].frame);
    assert!(shown[2].overlay.texts().all(|(text, _)| text != WARNING_TEXT));
}

#[test]
fn missing_model_fails_before_any_frame() {
    let dir = tempfile::tempdir().unwrap();
    let still = write_still(dir.path());
    let cfg = HelmetConfig {
        cascade_path: dir.path().join("haarcascade_helmet.xml"),
        fallback_image: still,
        camera: CameraSpec::Synthetic { frame_limit: None },
        headless: true,
        ..HelmetConfig::default()
    };
    match start_session(&cfg) {
        Err(StartupError::ModelMissing(path)) => assert_eq!(path, cfg.cascade_path),
        Err(other) => panic!("unexpected startup error: {other}"),
        Ok(_) => panic!("session must not start without a model"),
    }
}

#[test]
fn stub_model_runs_headless_to_the_frame_limit() {
    let cfg = HelmetConfig {
        cascade_path: PathBuf::from("stub://helmet"),
        fallback_image: PathBuf::from("/nonexistent/unused.jpg"),
        camera: "stub://camera".parse().unwrap(),
        headless: true,
        max_frames: Some(2),
        ..HelmetConfig::default()
    };
    cfg.validate().expect("valid config");

    let session = start_session(&cfg).expect("stub model starts without OpenCV");
    assert_eq!(session.mode(), SourceMode::Webcam);
    let summary = session.run();

    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert!(summary.is_clean());
    assert_eq!(summary.frames, 2);
    assert!(summary.camera_released);
    assert_eq!(summary.camera.map(|stats| stats.frames_captured), Some(2));
}

#[test]
fn no_camera_and_no_image_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let err = match FrameSource::open(&CameraSpec::Offline, &dir.path().join("absent.jpg")) {
        Err(err) => err,
        Ok(_) => panic!("expected startup failure"),
    };
    assert!(matches!(err, StartupError::NoFrameSource { .. }));
    assert!(err.to_string().contains("absent.jpg"));
}
