pub mod itinerary;
pub mod reconcile;
pub mod share;

pub use itinerary::{DayInput, Location, MarkerInput};
pub use reconcile::{
    plan_create, plan_update, ExistingDay, PlannedDay, PlannedMarker, ReconcilePlan, WriteOp,
};
pub use share::{generate_share_code, ParseShareTypeError, ShareType, SHARE_CODE_LEN};
