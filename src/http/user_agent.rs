//! Default User-Agent for library and content requests.

/// Default User-Agent identifying the crate and its version.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("borrow-engine/{version} (library-reader)")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_crate_version() {
        let agent = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            agent
                .strip_prefix("borrow-engine/")
                .and_then(|s| s.split(' ').next())
                .unwrap()
        );
    }
}
