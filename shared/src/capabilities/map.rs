use crux_core::capability::{CapabilityContext, Operation};
use serde::{Deserialize, Serialize};

use crate::event::{Coordinate, MapType, Zoom};

/// Accuracy circle color; green for a valid fix, red otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixColor {
    Green,
    Red,
}

/// Primitive commands for the shell's map SDK. There is a single map per session,
/// so operations carry no handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MapOperation {
    Create {
        center: Coordinate,
        zoom: Zoom,
        map_type: MapType,
    },
    PlaceMarker {
        position: Coordinate,
    },
    DrawAccuracyCircle {
        center: Coordinate,
        radius_m: f64,
        color: FixColor,
    },
    MoveMarker {
        position: Coordinate,
    },
    UpdateAccuracyCircle {
        center: Coordinate,
        radius_m: f64,
        color: FixColor,
    },
    SetCircleColor {
        color: FixColor,
    },
    SetCenter {
        center: Coordinate,
    },
    SetZoom {
        zoom: Zoom,
    },
    Dispose,
}

impl Operation for MapOperation {
    type Output = ();
}

#[derive(crux_core::macros::Capability)]
pub struct MapView<Ev> {
    context: CapabilityContext<MapOperation, Ev>,
}

impl<Ev> MapView<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<MapOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn apply(&self, operation: MapOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }
}
