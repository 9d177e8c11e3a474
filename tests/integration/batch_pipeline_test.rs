//! End-to-end batch exports against real files.

use super::test_support::{black_text, gradient, solid, write_image};
use photomark::batch::{
    BatchEvent, BatchJob, BatchPipeline, CancellationToken, ConflictPolicy, DestinationPolicy,
    ItemFailure,
};
use photomark::image_io::{FsImageIo, ImageIo, OutputFormat, ResizeTo};
use photomark::watermark::{Renderer, SystemFontResolver, WatermarkSpec};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn pipeline(workers: usize) -> BatchPipeline {
    BatchPipeline::new(Renderer::default(), Arc::new(FsImageIo::default())).with_workers(workers)
}

fn run(pipeline: &BatchPipeline, job: &BatchJob) -> photomark::batch::BatchReport {
    pipeline
        .run(job, &CancellationToken::new(), |_| {}, |_| {})
        .unwrap()
}

#[test]
fn test_exports_every_source_in_order() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let sources: Vec<PathBuf> = (0..6)
        .map(|i| write_image(input.path(), &format!("photo{}.png", i), &gradient(80 + i * 10, 60)))
        .collect();

    let job = BatchJob::new(
        sources.clone(),
        black_text("wm", 18.0),
        DestinationPolicy::new(output.path()),
    );
    let report = run(&pipeline(3), &job);

    assert_eq!(report.succeeded, 6);
    assert_eq!(report.items.iter().map(|i| i.path.clone()).collect::<Vec<_>>(), sources);

    let io = FsImageIo::default();
    for (i, item) in report.items.iter().enumerate() {
        let dest = item.dest().unwrap();
        assert_eq!(dest, &output.path().join(format!("photo{}.png", i)));
        let exported = io.decode(dest).unwrap();
        let original = io.decode(&item.path).unwrap();
        assert_eq!(
            (exported.width(), exported.height()),
            (original.width(), original.height())
        );
        assert_ne!(exported.to_rgba8(), original.to_rgba8());
    }
}

#[test]
fn test_partial_failure_does_not_stop_batch() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let good_a = write_image(input.path(), "a.png", &gradient(50, 50));
    let corrupt = input.path().join("b.jpg");
    fs::write(&corrupt, b"\xFF\xD8\xFF garbage that is not a jpeg").unwrap();
    let missing = input.path().join("c.png");
    let good_d = write_image(input.path(), "d.jpg", &gradient(50, 50));

    let job = BatchJob::new(
        vec![good_a, corrupt, missing, good_d],
        black_text("ok", 14.0),
        DestinationPolicy::new(output.path()),
    );
    let report = run(&pipeline(2), &job);

    assert_eq!(report.total(), 4);
    assert_eq!((report.succeeded, report.failed), (2, 2));
    assert!(report.items[0].is_success());
    assert!(matches!(report.items[1].failure(), Some(ItemFailure::Decode(_))));
    assert!(matches!(report.items[2].failure(), Some(ItemFailure::Decode(_))));
    assert!(report.items[3].is_success());
    assert!(output.path().join("d.jpg").exists());
}

#[test]
fn test_refuses_to_overwrite_sources() {
    let dir = TempDir::new().unwrap();
    let source = write_image(dir.path(), "keep.png", &gradient(30, 30));
    let before = fs::read(&source).unwrap();

    let job = BatchJob::new(
        vec![source.clone()],
        black_text("x", 12.0),
        DestinationPolicy::new(dir.path()),
    );
    let report = run(&pipeline(1), &job);

    assert!(matches!(
        report.items[0].failure(),
        Some(ItemFailure::UnsafeOverwrite { .. })
    ));
    assert_eq!(fs::read(&source).unwrap(), before);
}

#[test]
fn test_rerun_auto_renames_and_overwrite_replaces() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_image(input.path(), "pic.png", &gradient(40, 40));

    let mut job = BatchJob::new(
        vec![source],
        black_text("again", 12.0),
        DestinationPolicy::new(output.path()),
    );
    let first = run(&pipeline(1), &job);
    let second = run(&pipeline(1), &job);
    assert_eq!(first.items[0].dest(), Some(&output.path().join("pic.png")));
    assert_eq!(second.items[0].dest(), Some(&output.path().join("pic_1.png")));

    job.destination.conflict = ConflictPolicy::Overwrite;
    let third = run(&pipeline(1), &job);
    assert_eq!(third.items[0].dest(), Some(&output.path().join("pic.png")));
}

#[test]
fn test_numbered_names_forced_format_and_resize() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let sources = vec![
        write_image(input.path(), "wide.png", &gradient(200, 100)),
        write_image(input.path(), "small.bmp", &gradient(40, 20)),
    ];

    let mut policy = DestinationPolicy::new(output.path());
    policy.naming.keep_original_name = false;
    policy.naming.prefix = "wm_".to_string();
    policy.naming.force_format = Some(OutputFormat::Jpeg);
    policy.quality = 80;
    policy.resize = Some(ResizeTo::new(Some(100), None));

    let report = run(&pipeline(2), &BatchJob::new(sources, black_text("n", 10.0), policy));
    assert_eq!(report.succeeded, 2);

    let io = FsImageIo::default();
    let first = io.decode(&output.path().join("wm_image_0001.jpg")).unwrap();
    assert_eq!((first.width(), first.height()), (100, 50));
    let second = io.decode(&output.path().join("wm_image_0002.jpg")).unwrap();
    assert_eq!((second.width(), second.height()), (40, 20));
}

#[test]
fn test_cancellation_mid_run_reports_remaining_items() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let sources: Vec<PathBuf> = (0..8)
        .map(|i| write_image(input.path(), &format!("{}.png", i), &gradient(400, 300)))
        .collect();
    let job = BatchJob::new(
        sources.clone(),
        WatermarkSpec {
            rotation_degrees: 30.0,
            ..black_text("cancel me", 48.0)
        },
        DestinationPolicy::new(output.path()),
    );

    let cancel = CancellationToken::new();
    let report = pipeline(1)
        .run(&job, &cancel, |_| cancel.cancel(), |_| {})
        .unwrap();

    assert_eq!(report.total(), 8);
    assert!(report.succeeded >= 1);
    assert!(report.cancelled >= 1);
    assert_eq!(report.succeeded + report.cancelled, 8);
    assert_eq!(report.items.iter().map(|i| i.path.clone()).collect::<Vec<_>>(), sources);
    for item in report.items.iter().filter(|i| !i.is_success()) {
        assert_eq!(item.failure(), Some(&ItemFailure::Cancelled));
        assert!(!output.path().join(item.path.file_name().unwrap()).exists());
    }
}

#[test]
fn test_missing_font_falls_back_with_warning() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let source = write_image(input.path(), "f.png", &solid(60, 40, [255, 255, 255, 255]));

    let renderer = Renderer::new(Arc::new(SystemFontResolver::new(Vec::new())));
    let pipeline = BatchPipeline::new(renderer, Arc::new(FsImageIo::default()));
    let spec = WatermarkSpec {
        font_family: Some("No Such Family".to_string()),
        ..black_text("fallback", 14.0)
    };

    let report = pipeline
        .run(
            &BatchJob::new(vec![source], spec, DestinationPolicy::new(output.path())),
            &CancellationToken::new(),
            |_| {},
            |_| {},
        )
        .unwrap();

    assert!(report.items[0].is_success());
    assert_eq!(report.items[0].warnings.len(), 1);
    assert_eq!(report.warning_count(), 1);
}

#[test]
fn test_spawned_batch_delivers_events_then_report() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let sources: Vec<PathBuf> = (0..3)
        .map(|i| write_image(input.path(), &format!("s{}.png", i), &gradient(50, 50)))
        .collect();

    let handle = pipeline(2)
        .spawn(BatchJob::new(
            sources,
            black_text("{{index}}/{{total}}", 12.0),
            DestinationPolicy::new(output.path()),
        ))
        .unwrap();

    let mut progress = Vec::new();
    let mut items = 0;
    for event in handle.events().iter() {
        match event {
            BatchEvent::Progress(p) => progress.push(p.completed),
            BatchEvent::Item(_) => items += 1,
        }
    }
    let report = handle.join().unwrap();

    assert_eq!(items, 3);
    assert_eq!(progress, vec![1, 2, 3]);
    assert_eq!(report.succeeded, 3);
}
