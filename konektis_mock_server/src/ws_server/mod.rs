// konektis_mock_server/src/ws_server/mod.rs

pub mod client_session;
pub mod service;

pub use service::MockEnergyServer;
