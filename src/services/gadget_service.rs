use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::GadgetError;
use crate::state::gadgets::{Gadget, GadgetStore, NewGadget};

/// Current time at millisecond resolution.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Counts reported by `/system/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub available: usize,
    pub rented: usize,
}

/// List a new gadget. Always succeeds.
pub async fn create(store: &GadgetStore, draft: NewGadget) -> Gadget {
    let gadget = Gadget::from_draft(Uuid::new_v4().to_string(), draft, now());

    store
        .write()
        .await
        .insert(gadget.id.clone(), gadget.clone());
    store.mark_dirty();

    tracing::debug!(id = %gadget.id, name = ?gadget.name(), "Gadget created");
    gadget
}

/// All gadgets in ascending id order.
pub async fn list(store: &GadgetStore) -> Vec<Gadget> {
    store.read().await.values().cloned().collect()
}

pub async fn get(store: &GadgetStore, id: &str) -> Result<Gadget, GadgetError> {
    store
        .read()
        .await
        .get(id)
        .cloned()
        .ok_or_else(|| GadgetError::NotFound(id.to_string()))
}

/// Hand an available gadget to `renter`.
///
/// The write lock is held from the availability check to the update.
pub async fn rent(
    store: &GadgetStore,
    id: &str,
    renter: Option<String>,
) -> Result<Gadget, GadgetError> {
    let mut map = store.write().await;

    let gadget = map
        .get_mut(id)
        .ok_or_else(|| GadgetError::NotFound(id.to_string()))?;

    if !gadget.availability {
        tracing::info!(id, "Rent rejected: gadget is not available");
        return Err(GadgetError::NotAvailable(id.to_string()));
    }

    let renter = renter
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| GadgetError::MissingRenter(id.to_string()))?;

    gadget.availability = false;
    gadget.rented_by = Some(renter);
    gadget.updated_at = Some(now());
    let updated = gadget.clone();
    drop(map);

    store.mark_dirty();
    tracing::debug!(id, renter = ?updated.rented_by, "Gadget rented");
    Ok(updated)
}

/// Take back a rented gadget.
pub async fn return_gadget(store: &GadgetStore, id: &str) -> Result<Gadget, GadgetError> {
    let mut map = store.write().await;

    let gadget = map
        .get_mut(id)
        .ok_or_else(|| GadgetError::NotFound(id.to_string()))?;

    if gadget.availability {
        tracing::info!(id, "Return rejected: gadget is not rented");
        return Err(GadgetError::NotRented(id.to_string()));
    }

    gadget.availability = true;
    gadget.rented_by = None;
    gadget.updated_at = Some(now());
    let updated = gadget.clone();
    drop(map);

    store.mark_dirty();
    tracing::debug!(id, "Gadget returned");
    Ok(updated)
}

/// Remove a gadget in either state and hand back the removed record.
pub async fn delete(store: &GadgetStore, id: &str) -> Result<Gadget, GadgetError> {
    let removed = store
        .write()
        .await
        .remove(id)
        .ok_or_else(|| GadgetError::DeleteMissing(id.to_string()))?;

    store.mark_dirty();
    tracing::debug!(id, "Gadget deleted");
    Ok(removed)
}

pub async fn stats(store: &GadgetStore) -> Stats {
    let map = store.read().await;
    let rented = map.values().filter(|g| g.is_rented()).count();

    Stats {
        total: map.len(),
        available: map.len() - rented,
        rented,
    }
}
