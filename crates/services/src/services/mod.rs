pub mod attendance;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod database_validator;
pub mod obras;
pub mod permissions;
pub mod purchase_orders;
pub mod quotations;
pub mod references;
pub mod requirements;
pub mod roles;
pub mod trainings;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;
