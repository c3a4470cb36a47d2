//! Core billing logic, independent of how it is scheduled.
//!
//! Modules are listed leaf-first: tier resolution and spend aggregation feed the wallet
//! ledger, which the billing cycle and commission calculator build on. Auto-pause runs
//! on its own and only reads account balances.

/// Auto-pause of ad accounts whose balance reaches the threshold
pub mod auto_pause;
/// Postpay billing cycle over rolling spend windows
pub mod billing;
/// Employee commission calculation and recording
pub mod commission;
/// Tier table parsing and first-match resolution
pub mod fee_tier;
/// Read-only ledger consistency checks
pub mod reconcile;
/// Runtime key-value settings
pub mod settings;
/// Spend aggregation across ad platform insight tables
pub mod spend;
/// Subscription and service package registry
pub mod subscription;
/// Wallet balances and the append-only ledger
pub mod wallet;
