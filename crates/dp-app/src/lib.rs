/// Application glue for doppler-hand: CLI, dispatch adapters, export and config hot reload.

pub mod cli;
pub mod dispatch;
pub mod export;
pub mod hotreload;
