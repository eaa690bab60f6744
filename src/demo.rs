//! Illustrative endpoints: plain HTML, gzip JSON and a JSON stream.

use crate::compress;
use crate::http::{Body, Response};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

const STREAM_BUFFER: usize = 4;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
    pub rock: String,
    pub z: i32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geolocation {
    pub altitude: f64,
    pub latitude: f64,
    pub longitude: f64,
}

pub const LOCATIONS: [Geolocation; 8] = [
    Geolocation { altitude: -97.0, latitude: 37.819929, longitude: -122.478255 },
    Geolocation { altitude: 1899.0, latitude: 39.096849, longitude: -120.032351 },
    Geolocation { altitude: 2619.0, latitude: 37.865101, longitude: -119.538329 },
    Geolocation { altitude: 42.0, latitude: 33.812092, longitude: -117.918974 },
    Geolocation { altitude: 15.0, latitude: 37.77493, longitude: -122.419416 },
    Geolocation { altitude: 2613.0, latitude: 67.865101, longitude: -119.538329 },
    Geolocation { altitude: 44.0, latitude: 53.812092, longitude: -117.918974 },
    Geolocation { altitude: 25.0, latitude: 57.77493, longitude: -122.419416 },
];

pub fn hello() -> Response {
    Response::new(200)
        .with_header("Content-Type", "text/html; charset=utf8")
        .with_header("X-My-Header", "my-header-value")
        .with_header("Set-Cookie", "cookie-name=cookie-value")
        .with_body(Body::Bytes(b"<h1>Hello, world!</h1>".to_vec()))
}

/// JSON body that is always gzip-encoded, whatever the client accepts.
pub fn json() -> Response {
    let vertex = Vertex {
        x: 1,
        y: 2,
        rock: "Thay Cuong is happy".to_string(),
        z: 10,
    };

    let encoded = serde_json::to_vec(&vertex)
        .map_err(std::io::Error::from)
        .and_then(|body| compress::gzip(&body));
    match encoded {
        Ok(body) => Response::new(200)
            .with_header("Content-Encoding", "gzip")
            .with_header("Content-Type", "application/json; charset=utf8")
            .with_body(Body::Bytes(body)),
        Err(e) => {
            log::error!("json demo: {}", e);
            Response::text(500, "Internal server error")
        }
    }
}

/// Newline-delimited JSON written by a producer task, one item per
/// `interval`. The stream ends when the producer drops its sender.
pub fn stream(interval: Duration) -> Response {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(produce_locations(tx, interval));

    Response::new(200)
        .with_header("Content-Type", "application/json; charset=utf8")
        .with_body(Body::Stream(rx))
}

async fn produce_locations(tx: mpsc::Sender<Vec<u8>>, interval: Duration) {
    for (i, location) in LOCATIONS.iter().enumerate() {
        let mut line = match serde_json::to_vec(location) {
            Ok(line) => line,
            Err(_) => continue,
        };
        line.push(b'\n');

        if tx.send(line).await.is_err() {
            log::debug!("stream consumer went away after {} items", i);
            return;
        }
        if i + 1 < LOCATIONS.len() && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
    log::info!("location stream closed after {} items", LOCATIONS.len());
}
