pub mod config;
pub mod core_group;
pub mod logging;

pub use config::Config;
pub use core_group::{GroupError, GroupManager, GroupManagerImpl, GroupSqlStore, MembershipManager};
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = Config::default();
    }
}
