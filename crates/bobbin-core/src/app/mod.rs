//! App - アプリケーション層
//!
//! ports を組み合わせてタスク／lease のライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **LeaseManager**: lease カタログ（取得・延長・解放・期限切れ回収）
//! - **TaskManager**: タスクカタログと状態機械（lease は LeaseManager に委譲）
//! - **ReaperLoop**: retention を超えたタスクの定期削除
//! - **LeaseSweepLoop**: 期限切れ lease の定期回収
//! - **AppBuilder**: ワイヤリングと起動時ロード

pub mod background;
pub mod builder;
pub mod lease_manager;
pub mod reaper_loop;
pub mod status;
pub mod sweep_loop;
pub mod task_manager;

pub use self::background::BackgroundGroup;
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::lease_manager::{LeaseCounts, LeaseManager};
pub use self::reaper_loop::ReaperLoop;
pub use self::status::{StatusSnapshot, TaskCounts};
pub use self::sweep_loop::LeaseSweepLoop;
pub use self::task_manager::{ReapReport, TaskManager};
