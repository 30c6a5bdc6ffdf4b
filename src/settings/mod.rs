// Settings module - persisted user settings
//
// - `store`: the named-value interface and its memory / JSON-file backends
// - `loader`: versioned read with legacy migration and range checks
// - `writer`: asynchronous persistence used by the engine

pub mod loader;
pub mod store;
pub mod writer;

pub use loader::{keys, Settings, SettingsLoader, CURRENT_SETTINGS_VERSION, DEFAULT_BASELINE};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use writer::SettingsWriter;
