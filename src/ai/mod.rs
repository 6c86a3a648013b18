//! 自动对战模块：在虚拟时钟上重放完整的一场战斗。

pub mod autobattle;

pub use autobattle::{AutoBattleConfig, AutoBattleReport, AutoBattler};
