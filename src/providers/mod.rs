//! 能力提供方：搜索与正文阅读接口、超时执行器、HTTP 实现与内存实现

pub mod executor;
pub mod mock;
pub mod traits;
pub mod web;

pub use executor::ProviderExecutor;
pub use mock::{StaticReader, StaticSearchProvider};
pub use traits::{
    count_words, ContentReader, Divergence, ReadContent, Reference, SearchOptions, SearchProvider,
};
pub use web::{HttpReader, SearxSearchProvider};
