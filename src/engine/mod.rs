//! Engine module housing the detection core.
//!
//! `session` holds the single-threaded detection state machine, `core` runs it
//! on a worker behind an `EngineHandle`, and `sensor` defines the
//! accelerometer feeds that drive it.

pub mod clock;
pub mod core;
pub mod events;
pub mod sensor;
pub mod session;

pub use self::core::{EngineCommand, EngineHandle};
pub use clock::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use events::{SessionEvent, ShotSnapshot, ShotTrigger};
pub use sensor::{BridgeSensorFeed, ReadingSink, ScriptedSensorFeed, SensorFeed};
pub use session::DetectionSession;
