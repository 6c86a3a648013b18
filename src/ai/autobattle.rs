use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::{
    AttackAction, Clock, CreatureId, GameEvent, GameState, ManualClock, RuleEngine, RuleError,
    StartBattleAction,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutoBattleConfig {
    /// 超过该回合数仍未分出胜负则停止。
    pub max_rounds: u32,
    pub attack_index: u32,
}

impl Default for AutoBattleConfig {
    fn default() -> Self {
        Self {
            max_rounds: 500,
            attack_index: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBattleReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<CreatureId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loser: Option<CreatureId>,
    pub first_striker: CreatureId,
    pub rounds: u32,
    /// 虚拟时钟上经过的毫秒数。
    pub elapsed_ms: u64,
    pub events: Vec<GameEvent>,
    pub state: GameState,
}

/// 双方轮流出手，各自等待自己的冷却结束，直到一方获胜。
pub struct AutoBattler {
    config: AutoBattleConfig,
    rng: SmallRng,
}

impl AutoBattler {
    pub fn new(config: AutoBattleConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: AutoBattleConfig, seed: u64) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// 在状态副本上运行，原状态不受影响。
    pub fn run(
        &mut self,
        state: &GameState,
        ally_id: CreatureId,
        enemy_id: CreatureId,
    ) -> Result<AutoBattleReport, RuleError> {
        let mut state = state.clone();
        let ally_owner = state
            .owner_of(ally_id)
            .ok_or(RuleError::CreatureNotFound {
                creature_id: ally_id,
            })?
            .to_string();
        let enemy_owner = state
            .owner_of(enemy_id)
            .ok_or(RuleError::TargetNotFound { enemy_id })?
            .to_string();

        let start_ms = [ally_id, enemy_id]
            .iter()
            .filter_map(|id| state.get_creature(*id).and_then(|c| c.last_attack_time))
            .max()
            .unwrap_or_default();
        let clock = ManualClock::new(start_ms);
        let engine = RuleEngine::with_clock(clock.clone());

        let mut events = engine.start_battle(
            &mut state,
            StartBattleAction {
                caller: ally_owner.clone(),
                ally_id,
                enemy_id,
            },
        )?;

        let sides = [(ally_owner, ally_id), (enemy_owner, enemy_id)];
        let mut turn = usize::from(self.rng.gen_bool(0.5));
        let first_striker = sides[turn].1;
        let mut rounds = 0;
        let mut outcome = None;

        while rounds < self.config.max_rounds {
            let (caller, attacker_id) = &sides[turn];
            clock.advance(engine.cooldown_remaining(&state, *attacker_id)?);

            let mut resolved = engine.attack(
                &mut state,
                AttackAction {
                    caller: caller.clone(),
                    attacker_id: *attacker_id,
                    attack_index: self.config.attack_index,
                },
            )?;
            rounds += 1;

            let won = resolved
                .iter()
                .any(|event| matches!(event, GameEvent::BattleWin { .. }));
            events.append(&mut resolved);
            if won {
                outcome = Some((*attacker_id, sides[1 - turn].1));
                break;
            }
            turn = 1 - turn;
        }

        Ok(AutoBattleReport {
            winner: outcome.map(|(winner, _)| winner),
            loser: outcome.map(|(_, loser)| loser),
            first_striker,
            rounds,
            elapsed_ms: clock.now_ms() - start_ms,
            events,
            state,
        })
    }
}
