pub mod client;
pub mod controller;
pub mod deployment;
pub mod evm;
pub mod ledger;
pub mod notifications;
pub mod simulated;
pub mod ui;
pub mod units;
pub mod wallets;

pub mod test_helpers;
