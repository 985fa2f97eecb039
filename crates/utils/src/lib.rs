pub mod logging;
pub mod money;
pub mod pagination;
pub mod response;
pub mod validation;
