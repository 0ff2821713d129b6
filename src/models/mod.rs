pub mod event;
pub mod fleet;
pub mod geofence;
pub mod history;
pub mod live;
pub mod point;
pub mod trip;

pub use event::{DriverEvent, EventType, Severity};
pub use fleet::{Driver, Vehicle};
pub use geofence::{Geofence, GeofenceInput};
pub use history::{HistoryPage, HistoryQuery, HistorySort, SortOrder};
pub use live::{LiveMessage, PointUpdate};
pub use point::{GpsPoint, NewPoint, PointReport};
pub use trip::{Trip, TripAction, TripActionRequest, TripStatus};
