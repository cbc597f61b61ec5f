mod version_config_manager;

pub use version_config_manager::*;

#[cfg(test)]
mod version_config_manager_test;
