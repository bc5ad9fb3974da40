mod geofence;
mod resolver;

pub use geofence::{AlertTemplate, BoundingBox, GeofenceEvaluator, GeofenceRule};
pub use resolver::{
    GeoContext, GeoContextResolver, GeoError, LocationIqResolver, PROVIDER_ERROR_ZONE,
    UNRESOLVED_ZONE,
};
