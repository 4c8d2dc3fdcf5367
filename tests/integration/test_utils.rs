//! Test utilities for integration tests.
//!
//! Provides a local HTTP tile server that serves generated PNG tiles and
//! records every request, plus helpers for building maps against it.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use tileview::{GeoPoint, MapOptions, PixelSize, TileAddress, TileSourceConfig};

// =============================================================================
// Test Tile Server
// =============================================================================

struct ServerState {
    png: Bytes,
    online: AtomicBool,
    delay_ms: AtomicU64,
    request_count: AtomicUsize,
    hits: RwLock<HashMap<TileAddress, usize>>,
}

/// A tile server on `127.0.0.1` with request tracking.
///
/// Serves the same PNG for every tile at `/{z}/{x}/{y}`. While offline it
/// answers every request with `503 Service Unavailable`.
#[derive(Clone)]
pub struct TestTileServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl TestTileServer {
    /// Start a server serving 256 px tiles.
    pub async fn start() -> Self {
        Self::start_with_tile_size(256).await
    }

    pub async fn start_with_tile_size(tile_size: u32) -> Self {
        let state = Arc::new(ServerState {
            png: create_test_png(tile_size),
            online: AtomicBool::new(true),
            delay_ms: AtomicU64::new(0),
            request_count: AtomicUsize::new(0),
            hits: RwLock::new(HashMap::new()),
        });

        let router = Router::new()
            .route("/{z}/{x}/{y}", get(tile_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    /// Source config pointing at this server.
    pub fn config(&self) -> TileSourceConfig {
        TileSourceConfig::parse(&format!("http://{}/{{z}}/{{x}}/{{y}}", self.addr)).unwrap()
    }

    pub fn set_online(&self, online: bool) {
        self.state.online.store(online, Ordering::SeqCst);
    }

    /// Hold every response back by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Requests received for one tile.
    pub async fn hits(&self, address: TileAddress) -> usize {
        self.state.hits.read().await.get(&address).copied().unwrap_or(0)
    }

    /// Tiles of `zoom` that were requested at least once.
    pub async fn requested_at_zoom(&self, zoom: u8) -> Vec<TileAddress> {
        let mut tiles: Vec<TileAddress> = self
            .state
            .hits
            .read()
            .await
            .keys()
            .filter(|a| a.zoom == zoom)
            .copied()
            .collect();
        tiles.sort();
        tiles
    }
}

async fn tile_handler(
    State(state): State<Arc<ServerState>>,
    Path((z, x, y)): Path<(u8, u32, u32)>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    *state
        .hits
        .write()
        .await
        .entry(TileAddress::new(x, y, z))
        .or_insert(0) += 1;

    let delay = state.delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if !state.online.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ([(header::CONTENT_TYPE, "image/png")], state.png.clone()).into_response()
}

// =============================================================================
// Helpers
// =============================================================================

/// Create a solid PNG tile.
pub fn create_test_png(size: u32) -> Bytes {
    let img = RgbaImage::from_pixel(size, size, Rgba([64, 128, 192, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

/// A server address nothing listens on.
pub fn unreachable_config() -> TileSourceConfig {
    TileSourceConfig::parse("http://127.0.0.1:1/{z}/{x}/{y}").unwrap()
}

/// Options for a map of `width`x`height` at `zoom`, centered on (0, 0).
pub fn map_options(width: u32, height: u32, zoom: u8) -> MapOptions {
    MapOptions {
        center: GeoPoint::new(0.0, 0.0),
        zoom,
        viewport: PixelSize::new(width, height),
        request_timeout: Duration::from_secs(2),
        failover_interval: Duration::from_millis(20),
        ..MapOptions::default()
    }
}

pub fn deadline() -> tokio::time::Instant {
    tokio::time::Instant::now() + Duration::from_secs(10)
}
