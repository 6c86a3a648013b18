//! 生物注册表：铸造、持有上限与物种上限。

use serde::{Deserialize, Serialize};

use super::{
    rules::{ensure_integrity, RuleError},
    state::{CreatureId, CreatureStats, GameEvent, GameState, OwnerId, MAX_PER_OWNER},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MintAction {
    pub caller: OwnerId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetMaxSpeciesAction {
    pub caller: OwnerId,
    pub max_species: u32,
}

pub struct Registry;

impl Registry {
    pub fn mint(
        state: &mut GameState,
        action: MintAction,
    ) -> Result<(CreatureId, Vec<GameEvent>), RuleError> {
        ensure_integrity(state)?;

        if state.balance_of(&action.caller) >= MAX_PER_OWNER {
            return Err(RuleError::HoldingLimitExceeded {
                owner: action.caller,
                limit: MAX_PER_OWNER,
            });
        }

        let creature_id = state.allocate_creature(&action.caller, &action.name);
        let event = GameEvent::Transfer {
            from: None,
            to: action.caller,
            creature_id,
        };
        state.record_event(event.clone());
        Ok((creature_id, vec![event]))
    }

    pub fn set_max_species(
        state: &mut GameState,
        action: SetMaxSpeciesAction,
    ) -> Result<(), RuleError> {
        ensure_integrity(state)?;

        if action.caller != state.administrator {
            return Err(RuleError::NotAdministrator);
        }
        if action.max_species < state.max_species {
            return Err(RuleError::SpeciesCeilingDecrease {
                current: state.max_species,
                requested: action.max_species,
            });
        }
        state.max_species = action.max_species;
        Ok(())
    }

    pub fn max_species(state: &GameState) -> u32 {
        state.max_species
    }

    pub fn creature_stats(
        state: &GameState,
        creature_id: CreatureId,
    ) -> Result<CreatureStats, RuleError> {
        ensure_integrity(state)?;
        state
            .stats(creature_id)
            .ok_or(RuleError::CreatureNotFound { creature_id })
    }
}
