mod query_upstream;

pub use query_upstream::QueryUpstreamUseCase;
