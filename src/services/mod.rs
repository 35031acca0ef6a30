//! Asynchronous collaborators of the map field.
//!
//! Geolocation, overlay downloads and snapshot uploads all complete outside
//! the controller's run loop. Each one is wrapped in a channel: the request
//! is spawned (`spawn_local` on wasm, a worker thread on native) and the run
//! loop collects finished results with a non-blocking `try_recv`.

mod fetch;
mod location;
mod snapshot;

pub use fetch::{FetchError, OverlayChannel, OverlayFetched};
pub use location::{LocationChannel, LocationError, LocationFix};
pub use snapshot::{
    capture, parse_upload_response, snapshot_file_name, SnapshotChannel, SnapshotError,
    UploadRequest,
};
