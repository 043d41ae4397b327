use dispatch_core::geo::{FeatureCollection, MapFilter};

use crate::error::AppError;
use crate::store::DispatchStore;

/// Incidents with coordinates as GeoJSON points, newest first.
///
/// An unusable bounding box has already been dropped by [`MapFilter::new`];
/// the query then simply runs unfiltered by area.
pub async fn list_for_map(
    store: &dyn DispatchStore,
    filter: &MapFilter,
) -> Result<FeatureCollection, AppError> {
    let rows = store.list_incidents_for_map(filter).await?;
    tracing::debug!(
        rows = rows.len(),
        bbox = filter.bbox.is_some(),
        limit = filter.limit,
        "map query"
    );
    Ok(rows.into_iter().collect())
}
