//! Viewport geometry and clamping against a live tile server.

use super::test_utils::{deadline, map_options, TestTileServer};

use tileview::{GeoPoint, ImageCanvas, MapOptions, MapView, ScreenPoint, TileAddress};

#[tokio::test]
async fn test_1024x768_at_zoom_17_needs_6x5_tiles() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(MapOptions {
        center: GeoPoint::new(39.912341799204775, 32.851170267919244),
        ..map_options(1024, 768, 17)
    });
    map.set_tile_server(server.config(), true).await.unwrap();

    let window = map.required_window();
    assert_eq!((window.columns, window.rows), (6, 5));

    assert!(map.run_until_idle(deadline()).await);
    assert_eq!(map.stats().cached, 30);
    assert_eq!(server.requested_at_zoom(17).await.len(), 30);

    // The tile under the screen center is part of the window.
    let center = map.screen_to_tile(ScreenPoint::new(512.0, 384.0));
    let address = TileAddress::containing(center, 17).unwrap();
    assert!(window.contains(&address));
}

#[tokio::test]
async fn test_zoom_clamping_is_idempotent() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(512, 512, 2));
    map.set_max_zoom(4);
    map.set_tile_server(server.config(), true).await.unwrap();

    map.set_zoom_level(99);
    assert_eq!(map.zoom_level(), 4);
    map.run_until_idle(deadline()).await;

    let requests = server.request_count();
    let stats = map.stats();

    map.set_zoom_level(99);
    map.set_zoom_level(4);
    map.set_zoom_level(-7);
    assert_eq!(map.zoom_level(), 0);
    map.set_zoom_level(-1);
    assert_eq!(map.zoom_level(), 0);
    map.run_until_idle(deadline()).await;

    // Only the single drop to zoom 0 caused work.
    assert_eq!(map.stats().epoch, stats.epoch + 1);
    assert_eq!(server.request_count(), requests + 1);
}

#[tokio::test]
async fn test_latitude_clamped_at_poles() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(256, 256, 3));
    map.set_tile_server(server.config(), true).await.unwrap();

    map.set_latitude(-120.0);
    assert_eq!(map.latitude(), -90.0);
    map.set_longitude(-500.0);
    assert_eq!(map.longitude(), -180.0);

    // Nothing outside the grid is ever requested.
    assert!(map.run_until_idle(deadline()).await);
    for address in server.requested_at_zoom(3).await {
        assert!(address.is_valid(), "{}", address);
    }
}

#[tokio::test]
async fn test_render_to_canvas() {
    let server = TestTileServer::start().await;
    let mut map = MapView::new(map_options(300, 200, 2));
    map.set_tile_server(server.config(), true).await.unwrap();
    map.run_until_idle(deadline()).await;

    let mut canvas = ImageCanvas::new(map.size());
    let drawn = map.render(&mut canvas);

    assert_eq!(drawn, map.visible_tiles().len());
    assert_eq!(canvas.image().dimensions(), (300, 200));
    assert_eq!(canvas.image().get_pixel(150, 100).0, [64, 128, 192, 255]);
}
