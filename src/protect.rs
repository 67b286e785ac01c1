//! Connection protection policy.

use crate::config::Config;

/// The tag routing table peers are protected under with the connection manager.
pub const PROTECTION_TAG: &str = "kad-routing-table";

/// Returns whether the connection to a peer in the bucket with common prefix length `cpl` should
/// be exempt from pruning.
pub fn should_protect(cpl: u32, config: &Config) -> bool {
    if config.protect_all_buckets() {
        return true;
    }

    let protected = config.protected_buckets();
    protected >= 0 && i64::from(cpl) <= i64::from(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::options::{enable_protect_all_buckets, protected_buckets};

    fn config_with(max_cpl: i32, protect_all: bool) -> Config {
        let mut options = vec![protected_buckets(max_cpl)];
        if protect_all {
            options.push(enable_protect_all_buckets());
        }

        let mut config = Config::defaults();
        assert!(config.apply(options).is_ok());
        config
    }

    macro_rules! protect_cases {
        ($($name:ident: $max_cpl:expr, $protect_all:expr, $cpl:expr => $expected:expr;)*) => {
            $(
                paste::paste! {
                    #[test]
                    fn [<should_protect_ $name>]() {
                        let config = config_with($max_cpl, $protect_all);
                        assert_eq!(should_protect($cpl, &config), $expected);
                    }
                }
            )*
        };
    }

    protect_cases! {
        depth_1_cpl_0: 1, false, 0 => true;
        depth_1_cpl_1: 1, false, 1 => true;
        depth_1_cpl_2: 1, false, 2 => false;
        depth_0_cpl_0: 0, false, 0 => true;
        depth_0_cpl_1: 0, false, 1 => false;
        disabled_cpl_0: -1, false, 0 => false;
        disabled_cpl_max: -1, false, 256 => false;
        all_overrides_disabled: -1, true, 0 => true;
        all_overrides_depth: 1, true, 200 => true;
    }

    #[test]
    fn default_protects_first_two_buckets() {
        let config = Config::defaults();

        assert!(should_protect(0, &config));
        assert!(should_protect(1, &config));
        assert!(!should_protect(2, &config));
    }
}
