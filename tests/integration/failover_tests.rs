//! Source switching and failover against live and unreachable servers.

use std::time::Duration;

use super::test_utils::{deadline, map_options, unreachable_config, TestTileServer};

use tileview::{MapEvent, MapView, SourceError, TileSourceConfig};

/// Step the map until `done` holds, failing the test after ten seconds.
async fn step_until(map: &mut MapView, done: impl Fn(&MapView) -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !done(map) {
            map.step().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_unreachable_server_is_rejected() {
    let mut map = MapView::new(map_options(512, 512, 2));
    let mut events = map.subscribe();

    let result = map.set_tile_server(unreachable_config(), true).await;

    assert!(matches!(result, Err(SourceError::Network(_))));
    assert!(map.tile_server().is_invalid());
    assert!(map.is_failover_active(), "failover timer scheduled");
    assert_eq!(map.stats().fetches_started, 0);

    assert!(matches!(
        events.recv().await.unwrap(),
        MapEvent::TileServerRejected { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        MapEvent::SourceDegraded { .. }
    ));
}

#[tokio::test]
async fn test_rejected_switch_keeps_working_source() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 2));
    map.set_tile_server(server.config(), true).await.unwrap();
    map.run_until_idle(deadline()).await;
    let cached = map.stats().cached;

    assert!(map.set_tile_server(unreachable_config(), true).await.is_err());

    assert_eq!(map.tile_server(), &server.config());
    assert_eq!(map.stats().cached, cached, "cache untouched by a failed switch");
}

#[tokio::test]
async fn test_background_switch_reports_rejection() {
    let mut map = MapView::new(map_options(512, 512, 2));
    let mut events = map.subscribe();

    map.set_tile_server(unreachable_config(), false).await.unwrap();
    assert!(map.tile_server().is_invalid());

    step_until(&mut map, |m| m.is_failover_active()).await;
    assert!(matches!(
        events.recv().await.unwrap(),
        MapEvent::TileServerRejected { .. }
    ));
}

#[tokio::test]
async fn test_set_tile_servers_skips_unreachable_entries() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 2));

    map.set_tile_servers(vec![unreachable_config(), server.config()])
        .await
        .unwrap();

    assert_eq!(map.tile_server(), &server.config());
    assert_eq!(map.backup_tile_servers(), &[unreachable_config()]);
    assert!(!map.is_failover_active());
}

#[tokio::test]
async fn test_fails_over_to_backup_when_active_goes_down() {
    let primary = TestTileServer::start().await;
    let backup = TestTileServer::start().await;

    let mut map = MapView::new(map_options(512, 512, 2));
    map.set_tile_server(primary.config(), true).await.unwrap();
    map.add_backup_tile_server(backup.config());
    map.run_until_idle(deadline()).await;

    let mut events = map.subscribe();
    primary.set_online(false);

    // Zooming invalidates the cache; every refetch now fails.
    map.set_zoom_level(3);
    let backup_config = backup.config();
    step_until(&mut map, |m| m.tile_server() == &backup_config).await;

    assert!(!map.is_failover_active());
    assert_eq!(map.backup_tile_servers(), &[primary.config()]);

    assert!(map.run_until_idle(deadline()).await);
    assert!(map.stats().cached > 0);
    assert!(!backup.requested_at_zoom(3).await.is_empty());

    let mut seen_degraded = false;
    let mut seen_changed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            MapEvent::SourceDegraded { source } => {
                assert_eq!(source, primary.config());
                seen_degraded = true;
            }
            MapEvent::TileServerChanged { source, .. } => {
                assert_eq!(source, backup.config());
                seen_changed = true;
            }
            _ => {}
        }
    }
    assert!(seen_degraded);
    assert!(seen_changed);
}

#[tokio::test]
async fn test_recovers_when_active_comes_back() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 2));
    map.set_tile_server(server.config(), true).await.unwrap();
    map.run_until_idle(deadline()).await;

    server.set_online(false);
    map.set_zoom_level(3);
    step_until(&mut map, |m| m.is_failover_active()).await;

    server.set_online(true);
    step_until(&mut map, |m| !m.is_failover_active()).await;

    assert_eq!(map.tile_server(), &server.config());
    assert!(map.run_until_idle(deadline()).await);
    assert!(map.stats().cached > 0);
}

#[tokio::test]
async fn test_background_switch_survives_failover() {
    let primary = TestTileServer::start().await;
    let backup = TestTileServer::start().await;
    let requested = TestTileServer::start().await;
    requested.set_delay(Duration::from_millis(500));

    let mut map = MapView::new(map_options(512, 512, 2));
    map.set_tile_server(primary.config(), true).await.unwrap();
    map.add_backup_tile_server(backup.config());
    map.run_until_idle(deadline()).await;

    primary.set_online(false);
    map.set_zoom_level(3);
    step_until(&mut map, |m| m.is_failover_active()).await;

    let mut events = map.subscribe();
    map.set_tile_server(requested.config(), false).await.unwrap();

    // Failover promotes the backup long before the slow probe answers.
    let backup_config = backup.config();
    step_until(&mut map, |m| m.tile_server() == &backup_config).await;

    let requested_config = requested.config();
    step_until(&mut map, |m| m.tile_server() == &requested_config).await;

    let mut changed = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            MapEvent::TileServerChanged { source, .. } => changed.push(source),
            MapEvent::TileServerRejected { source, .. } => {
                panic!("{} rejected", source)
            }
            _ => {}
        }
    }
    assert_eq!(changed, vec![backup.config(), requested.config()]);
}

#[tokio::test]
async fn test_superseded_background_switch_is_reported() {
    let first = TestTileServer::start().await;
    let second = TestTileServer::start().await;
    first.set_delay(Duration::from_millis(200));

    let mut map = MapView::new(map_options(512, 512, 2));
    let mut events = map.subscribe();

    map.set_tile_server(first.config(), false).await.unwrap();
    map.set_tile_server(second.config(), true).await.unwrap();
    assert!(map.run_until_idle(deadline()).await);

    assert_eq!(map.tile_server(), &second.config());
    let mut rejected = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let MapEvent::TileServerRejected { source, .. } = event {
            rejected.push(source);
        }
    }
    assert_eq!(rejected, vec![first.config()]);
}

#[tokio::test]
async fn test_failover_without_candidates_stops() {
    let mut map = MapView::new(map_options(512, 512, 2));
    let _ = map.set_tile_server(unreachable_config(), true).await;
    assert!(map.is_failover_active());

    step_until(&mut map, |m| !m.is_failover_active()).await;
    assert!(map.tile_server().is_invalid());
}

#[tokio::test]
async fn test_invalid_sentinel_never_becomes_backup() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 2));

    map.set_tile_server(server.config(), true).await.unwrap();
    map.add_backup_tile_server(TileSourceConfig::invalid());

    assert!(map.backup_tile_servers().is_empty());
}
