use std::sync::Arc;

use bessie_core::{
    ClusterEntry, GalleryConfig, GalleryEvent, GallerySession, ImageRecord, Key, Layer,
    LoaderConfig, MemorySource, Mode, Request, SheetEvent, ViewerSession,
};

fn record(name: &str) -> ImageRecord {
    ImageRecord {
        id: format!("id-{name}"),
        original_name: name.to_string(),
        url: format!("photos/{name}"),
        thumbnail_url: None,
        gps_lat: None,
        gps_lon: None,
        cluster_id: None,
    }
}

fn cluster(id: i64, size: usize) -> ClusterEntry {
    ClusterEntry {
        cluster_id: Some(id),
        images: (0..size).map(|i| record(&format!("c{id}-{i}"))).collect(),
    }
}

fn viewer(source: &Arc<MemorySource>) -> ViewerSession<MemorySource> {
    ViewerSession::new(Arc::clone(source), LoaderConfig::default())
}

#[tokio::test]
async fn test_viewer_loads_short_library_in_two_requests() {
    let source = Arc::new(MemorySource::numbered(3));
    let mut session = viewer(&source);
    session.start();
    session.settle().await;

    assert_eq!(session.loader().len(), 3);
    assert_eq!(session.loader().total(), Some(3));
    assert_eq!(
        source.requests(),
        vec![
            Request::Images { offset: 0, limit: 1 },
            Request::Images { offset: 1, limit: 24 },
        ]
    );

    // Walking the whole library never asks for more.
    for _ in 0..5 {
        session.handle_key(Key::Right);
    }
    session.settle().await;
    assert_eq!(source.requests().len(), 2);
}

#[tokio::test]
async fn test_boundary_block_requested_once() {
    let source = Arc::new(MemorySource::numbered(60));
    let mut session = viewer(&source);
    session.start();
    session.settle().await;
    assert_eq!(session.loader().len(), 25);

    for _ in 0..23 {
        session.handle_key(Key::Right);
    }
    assert_eq!(session.cursor(), 23);
    assert!(session.is_loading());

    // Held back while the block is in flight; moving back does not
    // duplicate the request.
    session.handle_key(Key::Right);
    assert_eq!(session.cursor(), 23);
    session.handle_key(Key::Left);
    session.handle_key(Key::Right);
    session.settle().await;

    let blocks: Vec<_> = source
        .requests()
        .into_iter()
        .filter(|r| matches!(r, Request::Images { offset: 25, .. }))
        .collect();
    assert_eq!(blocks, vec![Request::Images { offset: 25, limit: 25 }]);
    assert_eq!(session.loader().len(), 50);
}

#[tokio::test]
async fn test_failed_block_retried_on_next_move() {
    let source = Arc::new(MemorySource::numbered(40));
    let mut session = viewer(&source);
    session.start();
    session.settle().await;

    source.fail_next(1);
    for _ in 0..23 {
        session.handle_key(Key::Right);
    }
    session.settle().await;
    assert_eq!(session.loader().len(), 25);

    session.handle_key(Key::Right);
    session.settle().await;
    assert_eq!(session.loader().len(), 40);
}

#[tokio::test]
async fn test_dispose_discards_in_flight_and_detaches() {
    let source = Arc::new(MemorySource::numbered(10));
    let mut session = viewer(&source);
    assert_eq!(session.listener_count(), 1);

    session.start();
    session.dispose();
    session.settle().await;

    assert!(session.loader().is_empty());
    assert!(session.current().is_none());
    assert_eq!(session.listener_count(), 0);
    assert!(!session.handle_key(Key::Right));
}

#[tokio::test]
async fn test_viewer_zoom_swallows_keys_and_restores_focus() {
    let source = Arc::new(MemorySource::numbered(10));
    let mut session = viewer(&source);
    session.start();
    session.settle().await;

    for _ in 0..3 {
        session.handle_key(Key::Right);
    }
    assert!(session.handle_key(Key::Space));
    assert!(session.is_zoomed());

    assert!(session.handle_key(Key::Right));
    assert!(session.handle_key(Key::Left));
    assert_eq!(session.cursor(), 3);

    assert!(session.handle_key(Key::Escape));
    assert!(!session.is_zoomed());
    assert_eq!(session.cursor(), 3);
    assert_eq!(session.current().map(|r| r.id.as_str()), Some("img-3"));
}

#[tokio::test]
async fn test_cluster_mode_orders_largest_cluster_first() {
    let source = Arc::new(MemorySource::new(
        Vec::new(),
        vec![cluster(1, 2), cluster(2, 5), cluster(3, 1)],
    ));
    let mut sheet = GallerySession::new(Arc::clone(&source), GalleryConfig { page_size: 30 }, 6);
    sheet.start(Mode::Numerical);
    sheet.settle().await;

    assert!(sheet.handle_key(Key::Char('c')));
    sheet.settle().await;

    let clusters: Vec<_> = sheet
        .visible()
        .iter()
        .map(|r| r.original_name.split('-').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        clusters,
        vec!["c2", "c2", "c2", "c2", "c2", "c1", "c1", "c3"]
    );
    assert_eq!(sheet.gallery().total(), 8);

    // Re-entering the active mode never refetches the manifest.
    sheet.handle_key(Key::Char('c'));
    sheet.settle().await;
    let manifests = source
        .requests()
        .into_iter()
        .filter(|r| *r == Request::Clusters)
        .count();
    assert_eq!(manifests, 1);
}

#[tokio::test]
async fn test_mode_switch_events_and_reset() {
    let source = Arc::new(MemorySource::new(
        (0..12).map(|i| record(&format!("n{i}.jpg"))).collect(),
        vec![cluster(1, 3)],
    ));
    let mut sheet = GallerySession::new(Arc::clone(&source), GalleryConfig { page_size: 5 }, 5);
    sheet.start(Mode::Numerical);
    sheet.settle().await;
    sheet.handle_key(Key::PageDown);
    sheet.settle().await;
    assert_eq!(sheet.gallery().offset(), 5);
    sheet.take_events();

    sheet.handle_key(Key::Char('c'));
    sheet.settle().await;
    assert_eq!(sheet.gallery().offset(), 0);
    let events = sheet.take_events();
    assert!(events.contains(&SheetEvent::Gallery(GalleryEvent::ModeChanged(Mode::Cluster))));
    assert_eq!(
        events.last(),
        Some(&SheetEvent::Gallery(GalleryEvent::LoadingFinished))
    );

    // Already in cluster mode.
    sheet.handle_key(Key::Char('c'));
    assert!(sheet.take_events().is_empty());
}

#[tokio::test]
async fn test_rapid_page_down_advances_past_pending_page() {
    let source = Arc::new(MemorySource::numbered(20));
    let mut sheet = GallerySession::new(Arc::clone(&source), GalleryConfig { page_size: 5 }, 5);
    sheet.start(Mode::Numerical);
    sheet.settle().await;

    sheet.handle_key(Key::PageDown);
    sheet.handle_key(Key::PageDown);
    sheet.settle().await;

    // Both page fetches run concurrently; only the set matters.
    let requests = source.requests();
    assert_eq!(requests.len(), 3);
    for offset in [0, 5, 10] {
        assert!(requests.contains(&Request::Images { offset, limit: 5 }));
    }
    assert_eq!(sheet.gallery().current_page(), 3);
    assert_eq!(sheet.gallery().offset(), 10);
}

#[tokio::test]
async fn test_modal_cycles_and_restores_grid_focus() {
    let source = Arc::new(MemorySource::numbered(6));
    let mut sheet = GallerySession::new(Arc::clone(&source), GalleryConfig { page_size: 30 }, 3);
    sheet.start(Mode::Numerical);
    sheet.settle().await;

    sheet.handle_key(Key::Right);
    sheet.handle_key(Key::Right);
    assert!(sheet.handle_key(Key::Space));
    assert_eq!(sheet.live_layer(), Layer::Modal);
    assert_eq!(sheet.modal_index(), Some(2));

    // Grid keys are suspended while the modal is live.
    sheet.handle_key(Key::Right);
    sheet.handle_key(Key::Right);
    sheet.handle_key(Key::Down);
    assert_eq!(sheet.modal_index(), Some(4));
    assert_eq!(sheet.cursor(), 2);

    sheet.handle_key(Key::Escape);
    assert_eq!(sheet.live_layer(), Layer::Grid);
    assert_eq!(sheet.cursor(), 2);

    sheet.handle_key(Key::Down);
    assert_eq!(sheet.cursor(), 5);
}

#[tokio::test]
async fn test_click_opens_modal_on_cell() {
    let source = Arc::new(MemorySource::numbered(6));
    let mut sheet = GallerySession::new(Arc::clone(&source), GalleryConfig::default(), 6);
    sheet.start(Mode::Numerical);
    sheet.settle().await;
    sheet.take_events();

    assert!(sheet.click(4));
    assert_eq!(sheet.modal_index(), Some(4));
    assert!(!sheet.click(1));
    sheet.handle_key(Key::Space);
    assert_eq!(
        sheet.take_events(),
        vec![SheetEvent::ModalOpened(4), SheetEvent::ModalClosed(4)]
    );
    assert!(!sheet.click(6));
}

#[tokio::test]
async fn test_gallery_dispose_leaves_no_listener() {
    let source = Arc::new(MemorySource::numbered(6));
    let mut sheet = GallerySession::new(Arc::clone(&source), GalleryConfig::default(), 6);
    sheet.start(Mode::Numerical);
    sheet.dispose();
    sheet.settle().await;

    assert_eq!(sheet.listener_count(), 0);
    assert!(sheet.visible().is_empty());
    assert!(!sheet.handle_key(Key::Char('c')));
    assert!(!sheet.click(0));
}
