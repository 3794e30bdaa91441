// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The frozen wire contract between the supervisor and a worker: the
//! `GRACEFUL_LISTENERS` environment variable format. Both the supervisor
//! side (which formats it) and the worker-side mirror (which parses it,
//! in `graceful-worker`) depend on this module so the two can never drift.

/// Environment variable name carrying inherited listener addresses.
pub const GRACEFUL_LISTENERS_ENV: &str = "GRACEFUL_LISTENERS";

const ENV_SEP: char = ';';

/// Format listener addresses for `GRACEFUL_LISTENERS`, in the same order
/// extra fds are attached starting at fd 3. An empty slice formats to the
/// empty string (no inherited sockets).
pub fn format_listener_addrs(addrs: &[String]) -> String {
    addrs.join(&ENV_SEP.to_string())
}

/// Parse `GRACEFUL_LISTENERS`'s value back into the ordered address list.
///
/// The empty string parses to an empty list (no inherited sockets) rather
/// than `vec![""]`, so that `parse(format(L)) == L` holds for `L = []` —
/// see DESIGN.md for why this departs from the original's raw
/// `strings.Split`.
pub fn parse_listener_addrs(value: &str) -> Vec<String> {
    if value.is_empty() {
        Vec::new()
    } else {
        value.split(ENV_SEP).map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_roundtrips() {
        let addrs: Vec<String> = vec![];
        assert_eq!(parse_listener_addrs(&format_listener_addrs(&addrs)), addrs);
    }

    #[test]
    fn single_address_roundtrips() {
        let addrs = vec!["127.0.0.1:8080".to_string()];
        assert_eq!(format_listener_addrs(&addrs), "127.0.0.1:8080");
        assert_eq!(parse_listener_addrs("127.0.0.1:8080"), addrs);
    }

    #[test]
    fn multiple_addresses_join_with_semicolon() {
        let addrs = vec!["127.0.0.1:8080".to_string(), "127.0.0.1:8081".to_string()];
        assert_eq!(format_listener_addrs(&addrs), "127.0.0.1:8080;127.0.0.1:8081");
    }

    proptest! {
        #[test]
        fn roundtrip_law_holds_for_arbitrary_address_lists(
            addrs in proptest::collection::vec("[a-z0-9.:]{1,20}", 0..8)
        ) {
            prop_assert_eq!(parse_listener_addrs(&format_listener_addrs(&addrs)), addrs);
        }
    }
}
