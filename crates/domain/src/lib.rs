pub mod error;
pub mod group;
pub mod identity;
pub mod mute;
pub mod notify;
pub mod ports;
pub mod profile;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
