use once_cell::sync::Lazy;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// 每个账户最多持有的生物数量。
pub const MAX_PER_OWNER: u8 = 6;
pub const DEFAULT_MAX_LIFE_POINT: u16 = 50;
pub const DEFAULT_COOLDOWN_MS: u64 = 1_000;
pub const DEFAULT_MAX_SPECIES: u32 = 5;
pub const BASIC_ATTACK: AttackId = 0;
/// 状态中保留的最近事件条数。
pub const MAX_EVENT_LOG: usize = 256;

/// 生物标识，从 1 开始递增，永不复用。
pub type CreatureId = u32;
/// 账户标识（地址字符串）。
pub type OwnerId = String;
/// 攻击目录中的下标。
pub type AttackId = u16;

/// 攻击目录中的一项。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttackSpec {
    pub id: AttackId,
    pub name: String,
    pub damage: u16,
}

impl AttackSpec {
    fn new(id: AttackId, name: impl Into<String>, damage: u16) -> Self {
        Self {
            id,
            name: name.into(),
            damage,
        }
    }
}

static ATTACK_CATALOG: Lazy<Vec<AttackSpec>> = Lazy::new(|| {
    vec![
        AttackSpec::new(BASIC_ATTACK, "Tackle", 5),
        AttackSpec::new(1, "Ember", 8),
        AttackSpec::new(2, "Water Gun", 8),
        AttackSpec::new(3, "Vine Whip", 8),
        AttackSpec::new(4, "Thunder Shock", 10),
    ]
});

pub fn attack_catalog() -> &'static [AttackSpec] {
    &ATTACK_CATALOG
}

pub fn find_attack(id: AttackId) -> Option<&'static AttackSpec> {
    ATTACK_CATALOG.iter().find(|attack| attack.id == id)
}

/// 部署时一次性传入的配置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    pub name: String,
    pub symbol: String,
    /// 物种抽取使用的随机种子。
    pub seed: u64,
    pub max_species: u32,
    pub max_life_point: u16,
    pub cooldown_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "Creature Arena".into(),
            symbol: "CRT".into(),
            seed: 1,
            max_species: DEFAULT_MAX_SPECIES,
            max_life_point: DEFAULT_MAX_LIFE_POINT,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

/// 生物的完整数据。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Creature {
    pub id: CreatureId,
    pub owner: OwnerId,
    pub name: String,
    pub species: u32,
    pub level: u32,
    pub life_point: u16,
    pub attacks: Vec<AttackId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battle_opponent: Option<CreatureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attack_time: Option<u64>,
}

impl Creature {
    pub fn new(
        id: CreatureId,
        owner: impl Into<OwnerId>,
        name: impl Into<String>,
        species: u32,
        life_point: u16,
    ) -> Self {
        Self {
            id,
            owner: owner.into(),
            name: name.into(),
            species,
            level: 1,
            life_point,
            attacks: vec![BASIC_ATTACK],
            battle_opponent: None,
            last_attack_time: None,
        }
    }

    pub fn is_fighting(&self) -> bool {
        self.battle_opponent.is_some()
    }
}

/// 对外暴露的只读属性快照。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatureStats {
    pub owner: OwnerId,
    pub name: String,
    pub species: u32,
    pub level: u32,
    pub life_point: u16,
    pub attacks: Vec<AttackId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_id: Option<CreatureId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attack_time: Option<u64>,
}

impl From<&Creature> for CreatureStats {
    fn from(creature: &Creature) -> Self {
        Self {
            owner: creature.owner.clone(),
            name: creature.name.clone(),
            species: creature.species,
            level: creature.level,
            life_point: creature.life_point,
            attacks: creature.attacks.clone(),
            opponent_id: creature.battle_opponent,
            last_attack_time: creature.last_attack_time,
        }
    }
}

/// 事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    Transfer {
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<OwnerId>,
        to: OwnerId,
        creature_id: CreatureId,
    },
    BattleBegin {
        enemy_id: CreatureId,
    },
    AttackSuccess {
        target_id: CreatureId,
        damage: u16,
        life_point: u16,
    },
    BattleWin {
        target_id: CreatureId,
        level: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    IdOutOfSequence {
        creature_id: CreatureId,
    },
    DuplicateCreatureId {
        creature_id: CreatureId,
    },
    UnknownOpponent {
        creature_id: CreatureId,
        opponent_id: CreatureId,
    },
    AsymmetricPairing {
        creature_id: CreatureId,
        opponent_id: CreatureId,
    },
    SameOwnerPairing {
        creature_id: CreatureId,
        opponent_id: CreatureId,
    },
    HoldingMismatch {
        owner: OwnerId,
        recorded: u8,
        actual: u8,
    },
    HoldingLimitExceeded {
        owner: OwnerId,
        count: u8,
    },
}

/// 注册表与战斗共享的唯一状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    #[serde(default)]
    pub config: RegistryConfig,
    pub administrator: OwnerId,
    pub max_species: u32,
    #[serde(default)]
    pub creatures: Vec<Creature>,
    #[serde(default)]
    pub holdings: BTreeMap<OwnerId, u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameState {
    pub fn new(config: RegistryConfig, administrator: impl Into<OwnerId>) -> Self {
        Self {
            max_species: config.max_species,
            config,
            administrator: administrator.into(),
            creatures: Vec::new(),
            holdings: BTreeMap::new(),
            event_log: Vec::new(),
        }
    }

    /// 追加事件；超过 `MAX_EVENT_LOG` 时丢弃最早的记录。
    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
        if self.event_log.len() > MAX_EVENT_LOG {
            let overflow = self.event_log.len() - MAX_EVENT_LOG;
            self.event_log.drain(..overflow);
        }
    }

    pub fn total_minted(&self) -> u32 {
        self.creatures.len() as u32
    }

    pub fn next_creature_id(&self) -> CreatureId {
        self.total_minted() + 1
    }

    pub fn get_creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creature_index(id).map(|index| &self.creatures[index])
    }

    pub fn get_creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        let index = self.creature_index(id)?;
        self.creatures.get_mut(index)
    }

    // id 连续分配且不删除，因此下标即 id - 1
    pub fn creature_index(&self, id: CreatureId) -> Option<usize> {
        let index = (id as usize).checked_sub(1)?;
        self.creatures
            .get(index)
            .filter(|creature| creature.id == id)
            .map(|_| index)
    }

    pub fn owner_of(&self, id: CreatureId) -> Option<&str> {
        self.get_creature(id).map(|creature| creature.owner.as_str())
    }

    pub fn is_owner(&self, caller: &str, id: CreatureId) -> bool {
        self.owner_of(id) == Some(caller)
    }

    pub fn balance_of(&self, owner: &str) -> u8 {
        self.holdings.get(owner).copied().unwrap_or_default()
    }

    pub fn stats(&self, id: CreatureId) -> Option<CreatureStats> {
        self.get_creature(id).map(CreatureStats::from)
    }

    /// 按种子与 id 确定性地抽取物种，范围为 `1..=max_species`。
    pub fn draw_species(&self, id: CreatureId) -> u32 {
        let nonce = u64::from(id).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let mut rng = SmallRng::seed_from_u64(self.config.seed ^ nonce);
        rng.gen_range(1..=self.max_species.max(1))
    }

    pub fn allocate_creature(&mut self, owner: &str, name: &str) -> CreatureId {
        let id = self.next_creature_id();
        let species = self.draw_species(id);
        self.creatures.push(Creature::new(
            id,
            owner,
            name,
            species,
            self.config.max_life_point,
        ));
        *self.holdings.entry(owner.to_string()).or_default() += 1;
        id
    }

    pub fn pair(&mut self, ally_id: CreatureId, enemy_id: CreatureId) {
        if let Some(ally) = self.get_creature_mut(ally_id) {
            ally.battle_opponent = Some(enemy_id);
        }
        if let Some(enemy) = self.get_creature_mut(enemy_id) {
            enemy.battle_opponent = Some(ally_id);
        }
    }

    pub fn clear_pairing(&mut self, first: CreatureId, second: CreatureId) {
        for id in [first, second] {
            if let Some(creature) = self.get_creature_mut(id) {
                creature.battle_opponent = None;
            }
        }
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let mut seen = HashSet::new();
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for (index, creature) in self.creatures.iter().enumerate() {
            if !seen.insert(creature.id) {
                return Err(IntegrityError::DuplicateCreatureId {
                    creature_id: creature.id,
                });
            }
            if creature.id as usize != index + 1 {
                return Err(IntegrityError::IdOutOfSequence {
                    creature_id: creature.id,
                });
            }
            *counts.entry(creature.owner.as_str()).or_default() += 1;

            if let Some(opponent_id) = creature.battle_opponent {
                let opponent = self.get_creature(opponent_id).ok_or(
                    IntegrityError::UnknownOpponent {
                        creature_id: creature.id,
                        opponent_id,
                    },
                )?;
                if opponent.battle_opponent != Some(creature.id) {
                    return Err(IntegrityError::AsymmetricPairing {
                        creature_id: creature.id,
                        opponent_id,
                    });
                }
                if opponent.owner == creature.owner {
                    return Err(IntegrityError::SameOwnerPairing {
                        creature_id: creature.id,
                        opponent_id,
                    });
                }
            }
        }

        // 计数用 usize，超出 u8 的持有量按 u8::MAX 报告
        for (owner, &actual) in &counts {
            let reported = u8::try_from(actual).unwrap_or(u8::MAX);
            if actual > usize::from(MAX_PER_OWNER) {
                return Err(IntegrityError::HoldingLimitExceeded {
                    owner: owner.to_string(),
                    count: reported,
                });
            }
            let recorded = self.balance_of(owner);
            if usize::from(recorded) != actual {
                return Err(IntegrityError::HoldingMismatch {
                    owner: owner.to_string(),
                    recorded,
                    actual: reported,
                });
            }
        }
        for (owner, &recorded) in &self.holdings {
            if recorded > 0 && !counts.contains_key(owner.as_str()) {
                return Err(IntegrityError::HoldingMismatch {
                    owner: owner.clone(),
                    recorded,
                    actual: 0,
                });
            }
        }

        Ok(())
    }

    /// 示例状态：两个账户各持有三只生物，便于前端调试。
    pub fn sample() -> Self {
        let mut state = GameState::new(RegistryConfig::default(), "admin");
        for (owner, names) in [
            ("trainer-red", ["Ember Pup", "Moss Toad", "Volt Mouse"]),
            ("trainer-blue", ["Tide Turtle", "Stone Mole", "Gale Finch"]),
        ] {
            for name in names {
                let id = state.allocate_creature(owner, name);
                state.record_event(GameEvent::Transfer {
                    from: None,
                    to: owner.to_string(),
                    creature_id: id,
                });
            }
        }
        state
    }
}

impl Default for GameState {
    fn default() -> Self {
        GameState::new(RegistryConfig::default(), OwnerId::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_state_passes_integrity_check() {
        let state = GameState::sample();
        state.integrity_check().expect("sample state should be consistent");
        assert_eq!(state.total_minted(), 6);
        assert_eq!(state.balance_of("trainer-red"), 3);
        assert_eq!(state.balance_of("nobody"), 0);
    }

    #[test]
    fn allocated_creatures_start_idle_with_full_life() {
        let mut state = GameState::default();
        let id = state.allocate_creature("ash", "Sparky");
        let creature = state.get_creature(id).expect("creature should exist");

        assert_eq!(id, 1);
        assert_eq!(creature.level, 1);
        assert_eq!(creature.life_point, DEFAULT_MAX_LIFE_POINT);
        assert_eq!(creature.attacks, vec![BASIC_ATTACK]);
        assert!(!creature.is_fighting());
        assert!(creature.last_attack_time.is_none());
    }

    #[test]
    fn species_is_deterministic_and_within_ceiling() {
        let state = GameState::default();
        for id in 1..50 {
            let species = state.draw_species(id);
            assert!((1..=state.max_species).contains(&species));
            assert_eq!(species, state.draw_species(id));
        }
    }

    #[test]
    fn integrity_check_rejects_one_sided_pairing() {
        let mut state = GameState::sample();
        state
            .get_creature_mut(1)
            .expect("creature 1 should exist")
            .battle_opponent = Some(4);

        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::AsymmetricPairing {
                creature_id: 1,
                opponent_id: 4
            })
        );
    }

    #[test]
    fn integrity_check_rejects_stale_holdings() {
        let mut state = GameState::sample();
        state.holdings.insert("trainer-red".into(), 5);

        assert!(matches!(
            state.integrity_check(),
            Err(IntegrityError::HoldingMismatch { recorded: 5, actual: 3, .. })
        ));
    }

    #[test]
    fn oversized_holding_is_rejected_without_overflow() {
        let mut state = GameState::default();
        for id in 1..=300 {
            state
                .creatures
                .push(Creature::new(id, "hoarder", "Clone", 1, DEFAULT_MAX_LIFE_POINT));
        }
        state.holdings.insert("hoarder".into(), u8::MAX);

        assert_eq!(
            state.integrity_check(),
            Err(IntegrityError::HoldingLimitExceeded {
                owner: "hoarder".into(),
                count: u8::MAX,
            })
        );
    }

    #[test]
    fn holding_of_exactly_256_does_not_wrap_to_zero() {
        let mut state = GameState::default();
        for id in 1..=256 {
            state
                .creatures
                .push(Creature::new(id, "hoarder", "Clone", 1, DEFAULT_MAX_LIFE_POINT));
        }

        assert!(matches!(
            state.integrity_check(),
            Err(IntegrityError::HoldingLimitExceeded { .. })
        ));
    }

    #[test]
    fn event_log_keeps_only_most_recent_entries() {
        let mut state = GameState::default();
        for creature_id in 1..=(MAX_EVENT_LOG as u32 + 10) {
            state.record_event(GameEvent::BattleBegin {
                enemy_id: creature_id,
            });
        }

        assert_eq!(state.event_log.len(), MAX_EVENT_LOG);
        assert_eq!(
            state.event_log.first(),
            Some(&GameEvent::BattleBegin { enemy_id: 11 })
        );
        assert_eq!(
            state.event_log.last(),
            Some(&GameEvent::BattleBegin {
                enemy_id: MAX_EVENT_LOG as u32 + 10
            })
        );
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let state = GameState::sample();
        assert!(state.get_creature(0).is_none());
        assert!(state.get_creature(100).is_none());
        assert!(state.owner_of(7).is_none());
    }

    #[test]
    fn basic_attack_is_in_catalog() {
        let basic = find_attack(BASIC_ATTACK).expect("basic attack should exist");
        assert_eq!(basic.damage, 5);
        assert!(attack_catalog().len() > 1);
        assert!(find_attack(26).is_none());
    }
}
