//! Full archive runs against an in-memory source.

use std::sync::Arc;

use mediavault::archive::{load_items, ArchiveError, Archiver, ContentItem, GalleryMedia};
use mediavault::config::Config;
use mediavault::progress::NullSink;
use mediavault::signal::CancelToken;
use tempfile::tempdir;

use super::support::{gradient, png_bytes, split, MemorySource};

// 2024-01-15 12:00:00 UTC
const CREATED: f64 = 1_705_320_000.0;

fn archiver(source: Arc<MemorySource>, cancel: Option<CancelToken>) -> Archiver {
    Archiver::new(&Config::default(), source, Arc::new(NullSink), cancel).unwrap()
}

#[tokio::test]
async fn test_archive_downloads_then_dedupes() {
    let root = tempdir().unwrap();
    let dir = root.path().join("alice");
    let source = Arc::new(MemorySource::new());
    let same = png_bytes(&gradient(48, 48));
    source.insert("https://i.example/one.jpg", same.clone());
    source.insert("https://i.example/two.jpg", same);
    source.insert("https://i.example/three.png", png_bytes(&split(60, 40)));

    let items = vec![
        ContentItem::new("p1", "https://i.example/one.jpg", CREATED),
        ContentItem::new("p2", "https://i.example/two.jpg", CREATED + 60.0),
        ContentItem::new("p3", "https://i.example/three.png", CREATED + 120.0),
        ContentItem::new("p4", "https://i.example/gone.jpg", CREATED),
        ContentItem::new("p5", "https://i.example/doc.pdf", CREATED),
    ];

    let report = archiver(source, None).archive(&items, &dir).await.unwrap();

    assert_eq!(report.items, 5);
    assert_eq!(report.requested, 4);
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].url, "https://i.example/gone.jpg");
    assert_eq!(report.unsupported.len(), 1);
    assert_eq!(report.unsupported[0].item_id, "p5");
    assert_eq!(report.duplicates_removed, 1);
    assert!(!report.cancelled);

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"2024-01-15-p3.png".to_string()));
    assert!(names.iter().all(|n| !n.ends_with(".part")));
}

#[tokio::test]
async fn test_gallery_members_numbered() {
    let root = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    source.insert("https://i.example/g1.jpg", png_bytes(&gradient(10, 10)));
    source.insert("https://i.example/g3.gif", png_bytes(&split(12, 12)));

    let item = ContentItem::new("gal", "https://feed.example/gal", CREATED).with_gallery(vec![
        GalleryMedia {
            url: Some("https://i.example/g1.jpg".into()),
            gif: None,
        },
        GalleryMedia { url: None, gif: None },
        GalleryMedia {
            url: None,
            gif: Some("https://i.example/g3.gif".into()),
        },
    ]);

    let report = archiver(source, None)
        .archive(&[item], root.path())
        .await
        .unwrap();

    assert_eq!(report.completed, 2);
    assert!(root.path().join("2024-01-15-gal-1.jpg").exists());
    assert!(root.path().join("2024-01-15-gal-3.gif").exists());
}

#[tokio::test]
async fn test_embed_pages_resolved_before_download() {
    let root = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    source.insert_page(
        "https://www.redgifs.com/watch/clip",
        r#"<img src="https://media.redgifs.com/Clip-mobile.jpg">"#,
    );
    source.insert("https://media.redgifs.com/Clip.mp4", b"mp4 data".to_vec());
    source.insert("https://vidble.com/v9.mp4", b"other mp4".to_vec());

    let items = vec![
        ContentItem::new("r", "https://www.redgifs.com/watch/clip", CREATED),
        ContentItem::new("v", "https://vidble.com/watch?v=v9", CREATED),
    ];
    let report = archiver(source, None)
        .archive(&items, root.path())
        .await
        .unwrap();

    assert_eq!(report.completed, 2, "{report:?}");
    assert!(root.path().join("2024-01-15-r.mp4").exists());
    assert!(root.path().join("2024-01-15-v.mp4").exists());
}

#[tokio::test]
async fn test_second_run_skips_seen_urls() {
    let root = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    source.insert("https://i.example/a.jpg", png_bytes(&gradient(8, 8)));
    let items = vec![ContentItem::new("a", "https://i.example/a.jpg", CREATED)];
    let archiver = archiver(source.clone(), None);

    let first = archiver.archive(&items, root.path()).await.unwrap();
    let second = archiver.archive(&items, root.path()).await.unwrap();

    assert_eq!(first.completed, 1);
    assert_eq!(second.completed, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(source.opens(), 1);
}

#[tokio::test]
async fn test_cancelled_run_skips_dedupe() {
    let root = tempdir().unwrap();
    let source = Arc::new(MemorySource::new());
    let bytes = png_bytes(&gradient(8, 8));
    source.insert("https://i.example/a.jpg", bytes.clone());
    source.insert("https://i.example/b.jpg", bytes);
    let token = CancelToken::new();
    token.cancel();

    let items = vec![
        ContentItem::new("a", "https://i.example/a.jpg", CREATED),
        ContentItem::new("b", "https://i.example/b.jpg", CREATED),
    ];
    let report = archiver(source.clone(), Some(token))
        .archive(&items, root.path())
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.completed, 0);
    assert_eq!(report.duplicates_found, 0);
    assert_eq!(source.opens(), 0);
}

#[test]
fn test_load_items_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("items.json");
    std::fs::write(
        &path,
        r#"[{"id": "x1", "url": "https://i.example/x.jpg", "created": 1705320000}]"#,
    )
    .unwrap();
    let items = load_items(&path).unwrap();
    assert_eq!(items[0].date_str(), "2024-01-15");

    assert!(matches!(
        load_items(&dir.path().join("absent.json")),
        Err(ArchiveError::ReadItems { .. })
    ));
}
