//! Duplicate resolver scenarios on real files.

use std::fs;
use std::sync::Arc;

use mediavault::duplicates::{DuplicateResolver, ResolverConfig, ResolverError};
use mediavault::progress::{ChannelSink, ProgressUpdate, RemovalStatus};
use tempfile::tempdir;

use super::support::{bmp_bytes, gradient, png_bytes, set_mtime, split, write_png};

const EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4"];

fn resolver() -> DuplicateResolver {
    DuplicateResolver::new(ResolverConfig::default()).unwrap()
}

#[tokio::test]
async fn test_oldest_copy_survives() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.jpg");
    let b = dir.path().join("b.jpg");
    let c = dir.path().join("c.jpg");
    write_png(&a, &gradient(64, 48));
    write_png(&b, &gradient(64, 48));
    write_png(&c, &split(64, 64));
    set_mtime(&a, 1_000);
    set_mtime(&b, 2_000);

    let report = resolver()
        .resolve_with_report(dir.path(), EXTS)
        .await
        .unwrap();

    assert_eq!(report.files_scanned, 3);
    assert_eq!(report.duplicates_found, 1);
    assert_eq!(report.duplicates_removed, 1);
    assert!(a.exists());
    assert!(!b.exists());
    assert!(c.exists());
}

#[tokio::test]
async fn test_lookalike_images_of_different_sizes_both_survive() {
    let dir = tempdir().unwrap();
    let img = gradient(64, 64);
    let png = png_bytes(&img);
    let bmp = bmp_bytes(&img);
    assert_ne!(png.len(), bmp.len());

    for (name, bytes, mtime) in [
        ("a.png", &png, 1),
        ("b.png", &png, 2),
        ("c.png", &bmp, 3),
        ("d.png", &bmp, 4),
    ] {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        set_mtime(&path, mtime);
    }

    let report = resolver()
        .resolve_with_report(dir.path(), EXTS)
        .await
        .unwrap();

    assert_eq!(report.duplicates_found, 2);
    assert_eq!(report.duplicates_removed, 2);
    let mut left: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    left.sort();
    assert_eq!(left, vec!["a.png", "c.png"]);
}

#[tokio::test]
async fn test_three_copies_keep_earliest() {
    let dir = tempdir().unwrap();
    let names = ["t3.mp4", "t1.mp4", "t2.mp4"];
    for (name, mtime) in names.iter().zip([300, 100, 200]) {
        let p = dir.path().join(name);
        fs::write(&p, b"identical clip bytes").unwrap();
        set_mtime(&p, mtime);
    }

    let report = resolver()
        .resolve_with_report(dir.path(), EXTS)
        .await
        .unwrap();

    assert_eq!(report.duplicates_found, 2);
    assert_eq!(report.duplicates_removed, 2);
    assert!(dir.path().join("t1.mp4").exists());
    assert!(!dir.path().join("t2.mp4").exists());
    assert!(!dir.path().join("t3.mp4").exists());
}

#[tokio::test]
async fn test_newer_file_with_earlier_name_is_removed() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.png");
    let second = dir.path().join("second.png");
    write_png(&first, &gradient(32, 32));
    write_png(&second, &gradient(32, 32));
    set_mtime(&first, 5_000);
    set_mtime(&second, 100);

    resolver().resolve(dir.path(), EXTS).await.unwrap();

    assert!(!first.exists());
    assert!(second.exists());
}

#[tokio::test]
async fn test_equal_mtime_keeps_first_path() {
    let dir = tempdir().unwrap();
    let paths: Vec<_> = ["m.jpg", "k.jpg", "z.jpg"]
        .iter()
        .map(|n| dir.path().join(n))
        .collect();
    for p in &paths {
        write_png(p, &gradient(40, 40));
        set_mtime(p, 1_234);
    }

    let report = resolver()
        .resolve_with_report(dir.path(), EXTS)
        .await
        .unwrap();

    assert_eq!(report.duplicates_found, 2);
    assert_eq!(report.duplicates_removed, 2);
    assert!(dir.path().join("k.jpg").exists());
    assert!(!dir.path().join("m.jpg").exists());
    assert!(!dir.path().join("z.jpg").exists());
}

#[tokio::test]
async fn test_videos_compared_by_content() {
    let dir = tempdir().unwrap();
    let one = dir.path().join("one.mp4");
    let two = dir.path().join("two.mp4");
    let other = dir.path().join("other.mp4");
    fs::write(&one, b"video-bytes-AAAA").unwrap();
    fs::write(&two, b"video-bytes-AAAA").unwrap();
    fs::write(&other, b"video-bytes-BBBB").unwrap();
    set_mtime(&one, 10);
    set_mtime(&two, 20);
    set_mtime(&other, 5);

    let removed = resolver().resolve(dir.path(), EXTS).await.unwrap();

    assert_eq!(removed, 1);
    assert!(one.exists());
    assert!(!two.exists());
    assert!(other.exists());
}

#[tokio::test]
async fn test_image_and_video_never_grouped() {
    let dir = tempdir().unwrap();
    let bytes = png_bytes(&gradient(16, 16));
    fs::write(dir.path().join("clip.mp4"), &bytes).unwrap();
    fs::write(dir.path().join("still.jpg"), &bytes).unwrap();

    let removed = resolver().resolve(dir.path(), EXTS).await.unwrap();

    assert_eq!(removed, 0);
    assert!(dir.path().join("clip.mp4").exists());
    assert!(dir.path().join("still.jpg").exists());
}

#[tokio::test]
async fn test_undecodable_images_are_kept() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("x.jpg"), b"not really a jpeg").unwrap();
    fs::write(dir.path().join("y.jpg"), b"not really a jpeg").unwrap();

    let report = resolver()
        .resolve_with_report(dir.path(), EXTS)
        .await
        .unwrap();

    assert_eq!(report.unreadable, 2);
    assert_eq!(report.duplicates_removed, 0);
    assert!(dir.path().join("x.jpg").exists());
    assert!(dir.path().join("y.jpg").exists());
}

#[tokio::test]
async fn test_other_extensions_and_subdirectories_ignored() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), b"same").unwrap();
    fs::write(dir.path().join("copy.txt"), b"same").unwrap();
    let nested = dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    write_png(&nested.join("a.png"), &gradient(20, 20));
    write_png(&nested.join("b.png"), &gradient(20, 20));

    let report = resolver()
        .resolve_with_report(dir.path(), EXTS)
        .await
        .unwrap();

    assert_eq!(report.files_scanned, 0);
    assert!(dir.path().join("copy.txt").exists());
    assert!(nested.join("b.png").exists());
}

#[tokio::test]
async fn test_missing_directory_reports_failure() {
    let dir = tempdir().unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let resolver = resolver().with_sink(Arc::new(sink));

    let result = resolver.resolve(&dir.path().join("gone"), EXTS).await;
    assert!(matches!(result, Err(ResolverError::Scan(_))));
    drop(resolver);

    let mut last = None;
    while let Some(update) = rx.recv().await {
        if let ProgressUpdate::Removal(progress) = update {
            last = Some(progress);
        }
    }
    assert_eq!(last.unwrap().status, RemovalStatus::Failed);
}

#[tokio::test]
async fn test_progress_counters_only_grow() {
    let dir = tempdir().unwrap();
    for i in 0..6 {
        let p = dir.path().join(format!("img{i}.png"));
        write_png(&p, &gradient(24, 24));
        set_mtime(&p, 100 + i);
    }
    let (sink, mut rx) = ChannelSink::new();
    let config = ResolverConfig {
        progress_batch: 2,
        ..ResolverConfig::default()
    };
    let resolver = DuplicateResolver::new(config)
        .unwrap()
        .with_sink(Arc::new(sink));

    let removed = resolver.resolve(dir.path(), EXTS).await.unwrap();
    assert_eq!(removed, 5);
    drop(resolver);

    let mut updates = Vec::new();
    while let Some(update) = rx.recv().await {
        if let ProgressUpdate::Removal(progress) = update {
            updates.push(progress);
        }
    }

    for pair in updates.windows(2) {
        assert!(pair[1].files_processed >= pair[0].files_processed);
        assert!(pair[1].duplicates_found >= pair[0].duplicates_found);
        assert!(pair[1].duplicates_removed >= pair[0].duplicates_removed);
    }
    let last = updates.last().unwrap();
    assert_eq!(last.status, RemovalStatus::Completed);
    assert_eq!(last.files_scanned, 6);
    assert_eq!(last.duplicates_found, 5);
    assert_eq!(last.duplicates_removed, 5);
    assert_eq!(
        updates.iter().filter(|u| u.status.is_terminal()).count(),
        1
    );
    assert!(dir.path().join("img0.png").exists());
}

#[tokio::test]
async fn test_empty_extension_list_rejected() {
    let dir = tempdir().unwrap();
    let none: &[&str] = &[];
    let result = resolver().resolve(dir.path(), none).await;
    assert!(matches!(result, Err(ResolverError::NoExtensions(_))));
}
