//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod ad_account;
pub mod commission_rate;
pub mod commission_transaction;
pub mod customer;
pub mod customer_assignment;
pub mod google_spend_insight;
pub mod meta_spend_insight;
pub mod service_package;
pub mod setting;
pub mod subscription;
pub mod subscription_transaction;
pub mod wallet;
pub mod wallet_transaction;

// Re-export specific types to avoid conflicts
pub use ad_account::{AdAccountStatus, AdPlatform, Entity as AdAccount};
pub use commission_rate::{CommissionType, Entity as CommissionRate};
pub use commission_transaction::Entity as CommissionTransaction;
pub use customer::Entity as Customer;
pub use customer_assignment::Entity as CustomerAssignment;
pub use google_spend_insight::Entity as GoogleSpendInsight;
pub use meta_spend_insight::Entity as MetaSpendInsight;
pub use service_package::Entity as ServicePackage;
pub use setting::Entity as Setting;
pub use subscription::{Entity as Subscription, PaymentMode, SubscriptionStatus};
pub use subscription_transaction::Entity as SubscriptionTransaction;
pub use wallet::{Entity as Wallet, WalletStatus};
pub use wallet_transaction::{Entity as WalletTransaction, TransactionStatus};
