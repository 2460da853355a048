pub mod bridge;
pub mod controller;
pub mod exposure;
pub mod frame;
pub mod loop_worker;
pub mod lux;
pub mod profile;
pub mod session;
pub mod state;
pub mod window;

pub use bridge::{MeterBridge, SimulatedBridge};
pub use controller::MeterController;
pub use session::MeterSession;
pub use state::{MeterSnapshot, MeterState};
