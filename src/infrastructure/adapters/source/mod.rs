//! Source Adapters - 书籍内容输入

mod manifest_source;

pub use manifest_source::ManifestSource;
