pub mod protocol;
pub mod rest;
pub mod save_task;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary mounts on the router.
pub use rest::calendar_handler;
pub use ws_handler::ws_handler;
