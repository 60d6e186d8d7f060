#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod attribute;
mod config_errors;
pub mod descriptor;
pub mod expr;
mod finder;
mod kind;
pub mod params;
pub mod status;

pub use self::{
    config_errors::{ConfigError, ConfigErrors},
    finder::{AspectValidator, AspectValidatorFinder, BuilderFinder},
    kind::{Kind, KindSet},
    params::Params,
    status::{Code, Status},
};
