//! CLI command implementations.

pub(crate) mod check_order;
pub(crate) mod plugins;
pub(crate) mod process;

pub(crate) use check_order::CheckOrderArgs;
pub(crate) use plugins::PluginsArgs;
pub(crate) use process::ProcessArgs;
