pub mod mock_resolvers;

pub use mock_resolvers::{EchoResolver, FailingResolver, MismatchResolver};
