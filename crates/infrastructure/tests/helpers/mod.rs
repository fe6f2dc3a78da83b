pub mod certs;
pub mod upstream_mock;

#[allow(unused_imports)]
pub use certs::TestCert;
#[allow(unused_imports)]
pub use upstream_mock::{query, MockUpstream};
