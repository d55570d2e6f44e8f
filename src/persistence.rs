use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::time::{sleep, Duration};

use crate::errors::StoreError;
use crate::state::gadgets::{GadgetMap, GadgetStore};

/// Load the snapshot at `path`.
///
/// The file is a JSON object keyed by gadget id. Records are re-keyed by
/// their own `id` field, which is authoritative.
pub async fn load_snapshot(path: &Path) -> Result<GadgetMap, StoreError> {
    let data = match fs::read_to_string(path).await {
        Ok(d) => d,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!("No snapshot found at startup (path = {})", path.display());
            return Ok(GadgetMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    let stored: GadgetMap = serde_json::from_str(&data)?;

    let map: GadgetMap = stored
        .into_iter()
        .map(|(key, gadget)| {
            if key != gadget.id {
                tracing::warn!("Snapshot key {} holds gadget {}, re-keying", key, gadget.id);
            }
            (gadget.id.clone(), gadget)
        })
        .collect();

    tracing::info!("Loaded snapshot: {} gadgets", map.len());
    Ok(map)
}

/// Replace the snapshot at `path` with `json`.
///
/// Writes a sibling `.tmp` file first and renames it over the target, so a
/// crash mid-write leaves the previous snapshot intact.
pub async fn write_snapshot(path: &Path, json: &str) -> Result<(), StoreError> {
    let tmp = tmp_path(path);
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Background task that periodically saves the snapshot.
pub async fn autosave_loop(store: GadgetStore, every_sec: u64) {
    let every = Duration::from_secs(every_sec.max(1));

    loop {
        sleep(every).await;

        if !store.is_dirty() {
            continue;
        }

        match store.save().await {
            Ok(true) => tracing::info!("Snapshot saved"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to save snapshot: {e}"),
        }
    }
}
