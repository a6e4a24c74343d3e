pub mod affiliates;
pub mod analytics;
pub mod audit_logs;
pub mod auth;
pub mod monitoring;
pub mod notifications;
pub mod promo_codes;
pub mod roles;
pub mod subscriptions;
pub mod users;
