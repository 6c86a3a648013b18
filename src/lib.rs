pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AutoBattleConfig, AutoBattleReport, AutoBattler};
pub use game::{
    attack_catalog, AttackAction, AttackSpec, Clock, Creature, CreatureId, CreatureStats,
    GameEvent, GameState, IntegrityError, ManualClock, MintAction, OwnerId, Registry,
    RegistryConfig, RuleEngine, RuleError, RuleResolution, SetMaxSpeciesAction,
    StartBattleAction, SystemClock, MAX_PER_OWNER,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    utils::warn(&error.to_string());
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn log_events(events: &[GameEvent]) {
    for event in events {
        if let GameEvent::BattleWin { target_id, level } = event {
            utils::log(&format!(
                "battle over: creature {target_id} defeated, winner reached level {level}"
            ));
        }
    }
}

fn resolution_from_events(state: &GameState, events: Vec<GameEvent>) -> RuleResolution {
    log_events(&events);
    RuleResolution::new(state.clone(), events)
}

fn make_resolution_json(resolution: RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn parse_config(config_json: Option<String>) -> Result<RegistryConfig, JsValue> {
    match config_json {
        Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error),
        None => Ok(RegistryConfig::default()),
    }
}

fn parse_state(json: &str) -> Result<GameState, JsValue> {
    let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(state)
}

#[derive(Serialize)]
struct MintResponse {
    creature_id: CreatureId,
    #[serde(flatten)]
    resolution: RuleResolution,
}

/// 持有一份状态的对局引擎；`&mut self` 保证所有修改操作串行执行。
#[wasm_bindgen]
pub struct ArenaEngine {
    state: GameState,
}

#[wasm_bindgen]
impl ArenaEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(administrator: String, config_json: Option<String>) -> Result<ArenaEngine, JsValue> {
        let config = parse_config(config_json)?;
        utils::log(&format!(
            "{} ({}) deployed, species ceiling {}",
            config.name, config.symbol, config.max_species
        ));
        Ok(ArenaEngine {
            state: GameState::new(config, administrator),
        })
    }

    #[wasm_bindgen(js_name = "fromStateJson")]
    pub fn from_state_json(json: &str) -> Result<ArenaEngine, JsValue> {
        Ok(ArenaEngine {
            state: parse_state(json)?,
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.state).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.state = parse_state(json)?;
        Ok(())
    }

    pub fn mint_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: MintAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        let (creature_id, events) = Registry::mint(&mut self.state, action).map_err(to_js_error)?;
        let response = MintResponse {
            creature_id,
            resolution: resolution_from_events(&self.state, events),
        };
        serde_json::to_string(&response).map_err(serde_to_js_error)
    }

    pub fn start_battle_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: StartBattleAction =
            serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        let events = RuleEngine::new()
            .start_battle(&mut self.state, action)
            .map_err(to_js_error)?;
        make_resolution_json(resolution_from_events(&self.state, events))
    }

    pub fn attack_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: AttackAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        let events = RuleEngine::new()
            .attack(&mut self.state, action)
            .map_err(to_js_error)?;
        make_resolution_json(resolution_from_events(&self.state, events))
    }

    pub fn set_max_species_json(&mut self, action_json: &str) -> Result<(), JsValue> {
        let action: SetMaxSpeciesAction =
            serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        Registry::set_max_species(&mut self.state, action).map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = "getMaxSpecies")]
    pub fn get_max_species(&self) -> u32 {
        Registry::max_species(&self.state)
    }

    pub fn creature_stats_json(&self, creature_id: CreatureId) -> Result<String, JsValue> {
        let stats = Registry::creature_stats(&self.state, creature_id).map_err(to_js_error)?;
        serde_json::to_string(&stats).map_err(serde_to_js_error)
    }

    pub fn balance_of(&self, owner: &str) -> u8 {
        self.state.balance_of(owner)
    }

    pub fn owner_of(&self, creature_id: CreatureId) -> Option<String> {
        self.state.owner_of(creature_id).map(str::to_string)
    }

    pub fn total_minted(&self) -> u32 {
        self.state.total_minted()
    }

    pub fn name(&self) -> String {
        self.state.config.name.clone()
    }

    pub fn symbol(&self) -> String {
        self.state.config.symbol.clone()
    }

    pub fn administrator(&self) -> String {
        self.state.administrator.clone()
    }

    pub fn cooldown_remaining(&self, creature_id: CreatureId) -> Result<f64, JsValue> {
        RuleEngine::new()
            .cooldown_remaining(&self.state, creature_id)
            .map(|remaining| remaining as f64)
            .map_err(to_js_error)
    }

    /// 返回一个在该生物冷却结束后完成的 Promise；核心本身从不等待。
    pub fn wait_for_cooldown(&self, creature_id: CreatureId) -> Result<Promise, JsValue> {
        let remaining = RuleEngine::new()
            .cooldown_remaining(&self.state, creature_id)
            .map_err(to_js_error)?;
        let delay = u32::try_from(remaining).unwrap_or(u32::MAX);

        Ok(future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            Ok(JsValue::from_f64(creature_id as f64))
        }))
    }

    pub fn simulate_battle(
        &self,
        ally_id: CreatureId,
        enemy_id: CreatureId,
        seed: Option<u32>,
        config_json: Option<String>,
    ) -> Result<String, JsValue> {
        let config: AutoBattleConfig = match config_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => AutoBattleConfig::default(),
        };
        let mut battler = match seed {
            Some(seed) => AutoBattler::with_seed(config, u64::from(seed)),
            None => AutoBattler::new(config),
        };
        let report = battler
            .run(&self.state, ally_id, enemy_id)
            .map_err(to_js_error)?;
        serde_json::to_string(&report).map_err(serde_to_js_error)
    }
}

/// 创建一个空的注册表状态；`config` 缺省时使用默认配置。
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state(administrator: String, config: JsValue) -> Result<JsValue, JsValue> {
    let config: RegistryConfig = if config.is_undefined() || config.is_null() {
        RegistryConfig::default()
    } else {
        from_value(config).map_err(JsValue::from)?
    };
    to_value(&GameState::new(config, administrator)).map_err(JsValue::from)
}

/// 返回示例状态，方便前端调试。
#[wasm_bindgen(js_name = "sampleGameState")]
pub fn sample_game_state() -> Result<JsValue, JsValue> {
    to_value(&GameState::sample()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "attackCatalog")]
pub fn attack_catalog_js() -> Result<JsValue, JsValue> {
    to_value(&attack_catalog()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "mint")]
pub fn mint(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: MintAction = from_value(action).map_err(JsValue::from)?;
    match Registry::mint(&mut state, action) {
        Ok((creature_id, events)) => {
            let response = MintResponse {
                creature_id,
                resolution: resolution_from_events(&state, events),
            };
            to_value(&response).map_err(JsValue::from)
        }
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "startBattle")]
pub fn start_battle(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: StartBattleAction = from_value(action).map_err(JsValue::from)?;
    match RuleEngine::new().start_battle(&mut state, action) {
        Ok(events) => to_value(&resolution_from_events(&state, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "attack")]
pub fn attack(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: AttackAction = from_value(action).map_err(JsValue::from)?;
    match RuleEngine::new().attack(&mut state, action) {
        Ok(events) => to_value(&resolution_from_events(&state, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "setMaxSpecies")]
pub fn set_max_species(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let mut state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: SetMaxSpeciesAction = from_value(action).map_err(JsValue::from)?;
    match Registry::set_max_species(&mut state, action) {
        Ok(()) => to_value(&state).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "creatureStats")]
pub fn creature_stats(state: JsValue, creature_id: CreatureId) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let stats = Registry::creature_stats(&state, creature_id).map_err(to_js_error)?;
    to_value(&stats).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}
