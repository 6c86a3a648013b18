//! 游戏核心逻辑模块（注册表、战斗状态机等）。

pub mod clock;
pub mod registry;
pub mod rules;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use registry::{MintAction, Registry, SetMaxSpeciesAction};
pub use rules::{AttackAction, RuleEngine, RuleError, RuleResolution, StartBattleAction};
pub use state::{
    attack_catalog,
    find_attack,
    AttackId,
    AttackSpec,
    Creature,
    CreatureId,
    CreatureStats,
    GameEvent,
    GameState,
    IntegrityError,
    OwnerId,
    RegistryConfig,
    MAX_EVENT_LOG,
    MAX_PER_OWNER,
};
