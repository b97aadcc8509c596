//! Impls - port の実装
//!
//! - **JsonFileStore**: 本番用（1 エンティティ 1 JSON ファイル）
//! - **InMemoryEntityStore**: 開発・テスト用

pub mod fs_store;
pub mod inmem_store;

pub use self::fs_store::JsonFileStore;
pub use self::inmem_store::InMemoryEntityStore;
