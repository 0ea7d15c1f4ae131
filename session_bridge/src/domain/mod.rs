// Domain layer: session records, error taxonomy and the ports the bridge uses.

pub mod entities;
pub mod errors;
pub mod ports;

pub use entities::{
    AuthChangeEvent, AuthStateChange, Destination, Notice, NoticeLevel, Routes, Session, User,
};
pub use errors::AuthError;
pub use ports::{
    AuthProvider, Clock, ConnectivityProbe, HealthCheck, Notifier, RoleLookup, SessionStorage,
};
