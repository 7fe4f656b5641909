pub mod barrier;
pub mod coordinator;
pub mod sampler;
pub mod store;
pub mod worker;

pub use coordinator::{Coordinator, Run, RunConfig, Summary};
pub use sampler::Sampler;

pub const RANDOM_ARTICLE_URL: &str = "https://en.wikipedia.org/wiki/Special:Random";

pub fn init_logger() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init()
}
