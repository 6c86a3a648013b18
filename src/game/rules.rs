use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    clock::{Clock, SystemClock},
    state::{find_attack, Creature, CreatureId, GameEvent, GameState, IntegrityError, OwnerId},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartBattleAction {
    pub caller: OwnerId,
    pub ally_id: CreatureId,
    pub enemy_id: CreatureId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttackAction {
    pub caller: OwnerId,
    pub attacker_id: CreatureId,
    /// 已学攻击列表中的位置。
    #[serde(default)]
    pub attack_index: u32,
}

/// 所有操作的拒绝原因；文案稳定，调用方可据此区分。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("Must be the owner")]
    NotOwner { creature_id: CreatureId },
    #[error("Can't be the owner of the enemy")]
    SelfBattle { enemy_id: CreatureId },
    #[error("Can't have more than {limit} creatures")]
    HoldingLimitExceeded { owner: OwnerId, limit: u8 },
    #[error("Your creature is already fighting")]
    AllyBusy { creature_id: CreatureId },
    #[error("Wrong versusId : Your target does not exist")]
    TargetNotFound { enemy_id: CreatureId },
    #[error("Your target is already fighting")]
    TargetBusy { enemy_id: CreatureId },
    #[error("Not in a fight")]
    NotInBattle { creature_id: CreatureId },
    #[error("This attack does not exist or has not been learned yet by your creature")]
    UnknownAttack { attack_index: u32 },
    #[error("It's your opponent's turn")]
    CooldownActive { remaining_ms: u64 },
    #[error("Can't decrease the amount of creature species")]
    SpeciesCeilingDecrease { current: u32, requested: u32 },
    #[error("Caller is not the administrator")]
    NotAdministrator,
    #[error("Creature {creature_id} does not exist")]
    CreatureNotFound { creature_id: CreatureId },
    #[error("State integrity violated: {error:?}")]
    IntegrityViolation { error: IntegrityError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        Self { state, events }
    }
}

pub(crate) fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
    state
        .integrity_check()
        .map_err(|error| RuleError::IntegrityViolation { error })
}

/// 战斗状态机：配对、攻击授权、冷却与胜负结算。
///
/// 每个操作先完成全部校验再修改状态，失败时状态保持不变。
#[derive(Debug, Default)]
pub struct RuleEngine<C: Clock = SystemClock> {
    clock: C,
}

impl RuleEngine<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> RuleEngine<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    fn ensure_owner(
        state: &GameState,
        caller: &str,
        creature_id: CreatureId,
    ) -> Result<(), RuleError> {
        if !state.is_owner(caller, creature_id) {
            return Err(RuleError::NotOwner { creature_id });
        }
        Ok(())
    }

    fn lookup(state: &GameState, creature_id: CreatureId) -> Result<&Creature, RuleError> {
        state
            .get_creature(creature_id)
            .ok_or(RuleError::CreatureNotFound { creature_id })
    }

    pub fn start_battle(
        &self,
        state: &mut GameState,
        action: StartBattleAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        ensure_integrity(state)?;
        Self::ensure_owner(state, &action.caller, action.ally_id)?;

        if state.is_owner(&action.caller, action.enemy_id) {
            return Err(RuleError::SelfBattle {
                enemy_id: action.enemy_id,
            });
        }

        let ally = Self::lookup(state, action.ally_id)?;
        if ally.is_fighting() {
            return Err(RuleError::AllyBusy {
                creature_id: action.ally_id,
            });
        }

        let enemy = state
            .get_creature(action.enemy_id)
            .ok_or(RuleError::TargetNotFound {
                enemy_id: action.enemy_id,
            })?;
        if enemy.is_fighting() {
            return Err(RuleError::TargetBusy {
                enemy_id: action.enemy_id,
            });
        }

        state.pair(action.ally_id, action.enemy_id);

        let event = GameEvent::BattleBegin {
            enemy_id: action.enemy_id,
        };
        state.record_event(event.clone());
        Ok(vec![event])
    }

    pub fn attack(
        &self,
        state: &mut GameState,
        action: AttackAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        ensure_integrity(state)?;
        Self::ensure_owner(state, &action.caller, action.attacker_id)?;

        let attacker = Self::lookup(state, action.attacker_id)?;
        let target_id = attacker.battle_opponent.ok_or(RuleError::NotInBattle {
            creature_id: action.attacker_id,
        })?;

        let attack = attacker
            .attacks
            .get(action.attack_index as usize)
            .and_then(|attack_id| find_attack(*attack_id))
            .ok_or(RuleError::UnknownAttack {
                attack_index: action.attack_index,
            })?;

        let now = self.clock.now_ms();
        let remaining_ms = Self::remaining_cooldown(state, attacker.last_attack_time, now);
        if remaining_ms > 0 {
            return Err(RuleError::CooldownActive { remaining_ms });
        }

        let damage = attack.damage;
        let target_life = Self::lookup(state, target_id)?.life_point;

        let event = if target_life <= damage {
            let level = {
                let attacker = state
                    .get_creature_mut(action.attacker_id)
                    .ok_or(RuleError::CreatureNotFound {
                        creature_id: action.attacker_id,
                    })?;
                attacker.level += 1;
                attacker.level
            };
            state.clear_pairing(action.attacker_id, target_id);
            GameEvent::BattleWin { target_id, level }
        } else {
            let life_point = target_life - damage;
            if let Some(target) = state.get_creature_mut(target_id) {
                target.life_point = life_point;
            }
            if let Some(attacker) = state.get_creature_mut(action.attacker_id) {
                attacker.last_attack_time = Some(now);
            }
            GameEvent::AttackSuccess {
                target_id,
                damage,
                life_point,
            }
        };

        state.record_event(event.clone());
        Ok(vec![event])
    }

    /// 距离下次可攻击还剩多少毫秒；0 表示可以立即攻击。
    pub fn cooldown_remaining(
        &self,
        state: &GameState,
        creature_id: CreatureId,
    ) -> Result<u64, RuleError> {
        let creature = Self::lookup(state, creature_id)?;
        Ok(Self::remaining_cooldown(
            state,
            creature.last_attack_time,
            self.clock.now_ms(),
        ))
    }

    fn remaining_cooldown(state: &GameState, last_attack_time: Option<u64>, now: u64) -> u64 {
        match last_attack_time {
            Some(last) => {
                let elapsed = now.saturating_sub(last);
                state.config.cooldown_ms.saturating_sub(elapsed)
            }
            None => 0,
        }
    }
}
