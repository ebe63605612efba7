mod http;
mod kv;
mod map;
mod timer;

pub use self::http::{
    ControlCommand, DeviceEndpoint, HttpError, HttpResponse, HttpResult, Resource,
    CONTROL_CONTENT_TYPE, PRECISION_HEADER,
};
pub use self::kv::{KvError, KvOutput, KvResult, PreferenceKey, PreferenceOperation, Preferences};
pub use self::map::{FixColor, MapOperation, MapView};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

// Crux's built-in render capability.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub timer: Timer<Event>,
    pub map_view: MapView<Event>,
    pub preferences: Preferences<Event>,
}
