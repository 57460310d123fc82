/*! Integration tests for cotext-core.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * - properties: proptest properties of the comparator, allocator, store and diff
 * - scenarios: end-to-end replica scenarios without any transport
 * - session: session drivers talking through the in-memory relay
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("cotext_core=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod helpers;
mod properties;
mod scenarios;
mod session;
