//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部（時刻・ID 生成・永続化）への境界です。
//! manager はこれらを `Arc<dyn ...>` で受け取り、実装の詳細を知りません。

pub mod clock;
pub mod entity_store;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::entity_store::{Entity, EntityStore, StoreError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
