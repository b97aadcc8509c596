//! bobbin-core
//!
//! Single-node task distribution: producers create tasks, workers lease them
//! for a bounded time and report back.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, lease, errors）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, EntityStore）
//! - **impls**: 実装（JsonFileStore, InMemoryEntityStore）
//! - **app**: アプリケーションロジック（TaskManager, LeaseManager, reaper, builder）
//! - **config**: 実行時設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{App, AppBuilder, LeaseManager, TaskManager};
pub use config::BobbinConfig;
pub use domain::{BobbinError, ErrorKind, Lease, LeaseId, Task, TaskId, TaskState};
