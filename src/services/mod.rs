pub mod access;
pub mod accounts;
pub mod bootstrap;
pub mod protocols;
pub mod recordings;

pub use accounts::AccountService;
pub use protocols::ProtocolService;
pub use recordings::RecordingService;
