//! Fetch orchestration against a live HTTP tile server.

use super::test_utils::{deadline, map_options, TestTileServer};

use tileview::source::{build_source, SourceSettings};
use tileview::tile::FetchOutcome;
use tileview::{MapEvent, MapView, ScreenPoint, TileAddress, TileOrchestrator};

fn zoom_two_grid() -> Vec<TileAddress> {
    (0..4)
        .flat_map(|y| (0..4).map(move |x| TileAddress::new(x, y, 2)))
        .collect()
}

#[tokio::test]
async fn test_map_fetches_required_window() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 2));
    let mut events = map.subscribe();

    map.set_tile_server(server.config(), true).await.unwrap();
    assert!(map.run_until_idle(deadline()).await);

    // Probe of 0/0/0 plus the whole 4x4 grid.
    assert_eq!(server.request_count(), 17);
    assert_eq!(server.requested_at_zoom(2).await, {
        let mut grid = zoom_two_grid();
        grid.sort();
        grid
    });
    assert_eq!(map.stats().cached, 16);
    assert_eq!(map.visible_tiles().len(), 4);

    assert!(matches!(
        events.recv().await.unwrap(),
        MapEvent::TileServerChanged { tile_size: 256, .. }
    ));
    assert_eq!(events.recv().await.unwrap(), MapEvent::RedrawNeeded);
}

#[tokio::test]
async fn test_tile_size_learned_from_probe() {
    let server = TestTileServer::start_with_tile_size(512).await;
    let mut map = MapView::new(map_options(1024, 1024, 1));

    map.set_tile_server(server.config(), true).await.unwrap();
    assert_eq!(map.tile_size(), 512);

    map.run_until_idle(deadline()).await;
    let rect = map.visible_tiles()[0].rect;
    assert_eq!(rect.width, 512.0);
}

#[tokio::test]
async fn test_orchestrator_requests_each_tile_once() {
    let server = TestTileServer::start().await;
    let source = build_source(&server.config(), &SourceSettings::default()).unwrap();
    let mut orchestrator = TileOrchestrator::with_source(source);

    let first = orchestrator.ensure_tiles(zoom_two_grid());
    let second = orchestrator.ensure_tiles(zoom_two_grid());
    assert_eq!(first.started, 16);
    assert_eq!(second.started, 0);

    while orchestrator.has_outstanding() {
        let completion = orchestrator.next_completion().await;
        let report = orchestrator.handle_completion(completion);
        assert_eq!(report.outcome, FetchOutcome::Inserted);
    }

    // Everything is cached now; asking again starts nothing.
    let third = orchestrator.ensure_tiles(zoom_two_grid());
    assert_eq!(third.started, 0);
    assert!(third.redraw_now);

    assert_eq!(server.request_count(), 16);
    for address in zoom_two_grid() {
        assert_eq!(server.hits(address).await, 1, "{}", address);
    }
}

#[tokio::test]
async fn test_invalidated_fetches_are_discarded() {
    let server = TestTileServer::start().await;
    let source = build_source(&server.config(), &SourceSettings::default()).unwrap();
    let mut orchestrator = TileOrchestrator::with_source(source);

    orchestrator.ensure_tiles(zoom_two_grid());
    let epoch = orchestrator.epoch();
    orchestrator.invalidate_all();
    assert_eq!(orchestrator.epoch(), epoch + 1);
    assert_eq!(orchestrator.in_flight_len(), 0);

    while orchestrator.has_outstanding() {
        let completion = orchestrator.next_completion().await;
        assert_eq!(completion.epoch, epoch);
        let report = orchestrator.handle_completion(completion);
        assert_eq!(report.outcome, FetchOutcome::Stale);
        assert!(!report.batch_complete);
    }
    assert!(orchestrator.cache().is_empty());

    // The same tiles can be requested again in the new epoch.
    assert_eq!(orchestrator.ensure_tiles(zoom_two_grid()).started, 16);
}

#[tokio::test]
async fn test_zoom_change_discards_previous_zoom() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 2));
    map.set_tile_server(server.config(), true).await.unwrap();

    // Switch zoom before any fetch of zoom 2 was applied.
    map.set_zoom_level(3);
    assert!(map.run_until_idle(deadline()).await);

    let tiles = map.visible_tiles();
    assert!(!tiles.is_empty());
    assert!(tiles.iter().all(|t| t.address.zoom == 3));
    assert_eq!(map.stats().in_flight, 0);
}

#[tokio::test]
async fn test_set_center_fetches_only_uncovered_tiles() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 4));
    map.set_tile_server(server.config(), true).await.unwrap();
    map.run_until_idle(deadline()).await;

    let epoch = map.stats().epoch;
    let before = server.requested_at_zoom(4).await;
    let old_window = map.required_window();

    // A bit more than one tile width east.
    map.pan_by_pixels(-300.0, 0.0);
    assert_eq!(map.stats().epoch, epoch, "panning keeps the cache");
    map.run_until_idle(deadline()).await;

    let new_window = map.required_window();
    assert_eq!(new_window.x_start, old_window.x_start + 1);

    let after = server.requested_at_zoom(4).await;
    let added: Vec<_> = after.iter().filter(|a| !before.contains(a)).collect();
    assert_eq!(added.len(), new_window.rows as usize);
    assert!(added
        .iter()
        .all(|a| a.x as i64 == new_window.x_start + new_window.columns as i64 - 1));

    for address in &before {
        assert_eq!(server.hits(*address).await, 1, "{} refetched", address);
    }
}

#[tokio::test]
async fn test_latitude_change_fetches_only_new_row() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 4));
    map.set_tile_server(server.config(), true).await.unwrap();
    map.run_until_idle(deadline()).await;

    let epoch = map.stats().epoch;
    let longitude = map.longitude();
    let before = server.requested_at_zoom(4).await;
    let old_window = map.required_window();

    // Two moves south, the second a bit more than one tile below the start.
    let halfway = map.screen_to_geo(ScreenPoint::new(256.0, 256.0 + 150.0));
    let target = map.screen_to_geo(ScreenPoint::new(256.0, 256.0 + 300.0));
    map.set_latitude(halfway.latitude());
    map.set_latitude(target.latitude());
    assert_eq!(map.longitude(), longitude);
    assert_eq!(map.stats().epoch, epoch, "latitude changes keep the cache");
    map.run_until_idle(deadline()).await;

    let new_window = map.required_window();
    assert_eq!(new_window.x_start, old_window.x_start);
    assert_eq!(new_window.y_start, old_window.y_start + 1);

    let after = server.requested_at_zoom(4).await;
    let added: Vec<_> = after.iter().filter(|a| !before.contains(a)).collect();
    assert_eq!(added.len(), new_window.columns as usize);
    assert!(added
        .iter()
        .all(|a| a.y as i64 == new_window.y_start + new_window.rows as i64 - 1));

    for address in &before {
        assert_eq!(server.hits(*address).await, 1, "{} refetched", address);
    }
}
