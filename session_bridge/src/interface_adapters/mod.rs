// Interface adapters: provider client, storage and the headless port implementations.

pub mod clients;
pub mod health;
pub mod notify;
pub mod protocol;
pub mod roles;
pub mod state;
pub mod storage;
